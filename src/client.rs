//! Authenticated POST with fixed-delay retry and response classification.

use crate::config::ZeptoMailConfig;
use crate::errors::{ApiError, ConfigError, HttpStatusError, SendError};
use crate::http::{HttpBackend, HttpRequest, HttpResponse};
use crate::logger::Logger;
use serde_json::Value;

/// `Authorization: Zoho-enczapikey <key>`.
pub const AUTH_SCHEME: &str = "Zoho-enczapikey";

const REDACTED: &str = "<redacted>";

/// Outcome of a successful send.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    /// Parsed response body.
    pub response: Value,
    /// Headers exactly as sent, credentials included. Use [`Self::redacted_headers`] to log.
    pub request_headers: Vec<(String, String)>,
    pub attempts: u32,
}

impl DispatchReport {
    /// The vendor's `request_id`, when present.
    pub fn request_id(&self) -> Option<&str> {
        self.response.get("request_id").and_then(Value::as_str)
    }

    pub fn redacted_headers(&self) -> Vec<(String, String)> {
        redact(&self.request_headers)
    }
}

fn redact(headers: &[(String, String)]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(k, v)| {
            if k.eq_ignore_ascii_case("Authorization") {
                (k.clone(), format!("{} {}", AUTH_SCHEME, REDACTED))
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}

/// 2xx without a top-level `error` key is the only success.
fn classify(response: HttpResponse) -> Result<Value, SendError> {
    if !response.is_success() {
        return Err(HttpStatusError {
            status: response.status,
            body: response.body,
        }
        .into());
    }
    let value: Value = serde_json::from_str(&response.body)
        .map_err(|e| SendError::InvalidResponse(format!("{} (body: {})", e, response.body)))?;
    if value.get("error").is_some() {
        return Err(ApiError {
            body: value.to_string(),
        }
        .into());
    }
    Ok(value)
}

/// ZeptoMail API client over any [`HttpBackend`].
pub struct ZeptoMailClient<B> {
    config: ZeptoMailConfig,
    backend: B,
    logger: Logger,
}

impl<B: HttpBackend> ZeptoMailClient<B> {
    /// Fails eagerly when the config is unusable.
    pub fn new(config: ZeptoMailConfig, backend: B) -> Result<Self, ConfigError> {
        config.validate()?;
        let logger = Logger::new(config.log_level, "[ZeptoMail] ");
        Ok(Self {
            config,
            backend,
            logger,
        })
    }

    pub fn config(&self) -> &ZeptoMailConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    fn request_headers(&self) -> Vec<(String, String)> {
        vec![
            (
                "Authorization".to_string(),
                format!("{} {}", AUTH_SCHEME, self.config.api_key.trim()),
            ),
            ("Accept".to_string(), "application/json".to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
        ]
    }

    /// `POST {base}{path}`. Each attempt gets a fresh timeout; retryable failures are
    /// retried after a fixed delay until the attempts run out.
    pub async fn post(&self, path: &str, payload: &Value) -> Result<DispatchReport, SendError> {
        self.post_with_logger(path, payload, &self.logger).await
    }

    pub(crate) async fn post_with_logger(
        &self,
        path: &str,
        payload: &Value,
        logger: &Logger,
    ) -> Result<DispatchReport, SendError> {
        let request = HttpRequest {
            url: format!("{}{}", self.config.base_url(), path),
            headers: self.request_headers(),
            body: serde_json::to_string(payload).map_err(|e| SendError::InvalidPayload(e.to_string()))?,
        };
        let max_attempts = self.config.attempts();
        logger.debug(&format!(
            "POST {} headers={:?}",
            request.url,
            redact(&request.headers)
        ));

        let mut attempt = 1;
        loop {
            let outcome = match self.backend.post(&request, self.config.timeout()).await {
                Ok(response) => classify(response),
                Err(e) => Err(e.into()),
            };
            match outcome {
                Ok(response) => {
                    logger.debug(&format!("attempt {}/{} succeeded", attempt, max_attempts));
                    return Ok(DispatchReport {
                        response,
                        request_headers: request.headers,
                        attempts: attempt,
                    });
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    logger.warn(&format!(
                        "attempt {}/{} failed ({}): {}; retrying in {}ms",
                        attempt,
                        max_attempts,
                        err.code(),
                        err,
                        self.config.retry_delay_ms
                    ));
                    self.backend.sleep(self.config.retry_delay()).await;
                    attempt += 1;
                }
                Err(err) => {
                    logger.error(&format!(
                        "POST {} failed after {} attempt(s) ({}): {}",
                        request.url,
                        attempt,
                        err.code(),
                        err
                    ));
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportError;
    use crate::logger::LogLevel;
    use async_trait::async_trait;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::time::Duration;

    #[derive(Default)]
    struct Scripted {
        replies: RefCell<VecDeque<Result<HttpResponse, TransportError>>>,
        requests: RefCell<Vec<(HttpRequest, Duration)>>,
        sleeps: RefCell<Vec<Duration>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<HttpResponse, TransportError>>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait(?Send)]
    impl HttpBackend for Scripted {
        async fn post(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError> {
            self.requests.borrow_mut().push((request.clone(), timeout));
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::network("script exhausted")))
        }

        async fn sleep(&self, duration: Duration) {
            self.sleeps.borrow_mut().push(duration);
        }
    }

    fn ok(status: u16, body: &str) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status,
            body: body.to_string(),
        })
    }

    fn client(replies: Vec<Result<HttpResponse, TransportError>>, attempts: u32) -> ZeptoMailClient<Scripted> {
        let config = ZeptoMailConfig {
            max_attempts: attempts,
            retry_delay_ms: 250,
            timeout_secs: 7,
            log_level: LogLevel::None,
            ..ZeptoMailConfig::new("secret-key")
        };
        ZeptoMailClient::new(config, Scripted::new(replies)).unwrap()
    }

    #[test]
    fn test_missing_key_fails_at_setup() {
        let result = ZeptoMailClient::new(ZeptoMailConfig::default(), Scripted::default());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_request_shape() {
        let client = client(vec![ok(201, r#"{"request_id":"r-1","data":[]}"#)], 1);
        let report = client.post("/v1.1/email", &json!({"subject": "Hi"})).await.unwrap();
        assert_eq!(report.request_id(), Some("r-1"));
        assert_eq!(report.attempts, 1);

        let requests = client.backend().requests.borrow();
        let (request, timeout) = &requests[0];
        assert_eq!(request.url, "https://api.zeptomail.com/v1.1/email");
        assert_eq!(*timeout, Duration::from_secs(7));
        assert_eq!(request.body, r#"{"subject":"Hi"}"#);
        assert_eq!(
            request.headers,
            vec![
                ("Authorization".to_string(), "Zoho-enczapikey secret-key".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ]
        );
        assert_eq!(report.request_headers, request.headers);
        assert_eq!(report.redacted_headers()[0].1, "Zoho-enczapikey <redacted>");
    }

    #[tokio::test]
    async fn test_error_key_in_2xx_is_failure() {
        let client = client(vec![ok(200, r#"{"error":{"message":"bad sender"}}"#)], 3);
        let err = client.post("/v1.1/email", &json!({})).await.unwrap_err();
        match err {
            SendError::Api(e) => assert!(e.body.contains("bad sender")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(client.backend().requests.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_then_success() {
        let client = client(
            vec![Err(TransportError::timeout("timed out")), ok(200, r#"{"data":[]}"#)],
            2,
        );
        let report = client.post("/v1.1/email", &json!({})).await.unwrap();
        assert_eq!(report.attempts, 2);
        assert_eq!(client.backend().requests.borrow().len(), 2);
        assert_eq!(*client.backend().sleeps.borrow(), vec![Duration::from_millis(250)]);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let client = client(vec![ok(503, "busy"), ok(502, "bad gateway"), ok(500, "boom")], 3);
        let err = client.post("/v1.1/email", &json!({})).await.unwrap_err();
        match err {
            SendError::Http(e) => {
                assert_eq!(e.status, 500);
                assert_eq!(e.body, "boom");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(client.backend().requests.borrow().len(), 3);
        assert_eq!(client.backend().sleeps.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let client = client(vec![ok(400, r#"{"error":{"code":"TM_3201"}}"#)], 3);
        let err = client.post("/v1.1/email", &json!({})).await.unwrap_err();
        assert!(matches!(err, SendError::Http(ref e) if e.status == 400));
        assert_eq!(client.backend().requests.borrow().len(), 1);
        assert!(client.backend().sleeps.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_success_body() {
        let client = client(vec![ok(200, "<html>")], 1);
        let err = client.post("/v1.1/email", &json!({})).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_RESPONSE");
    }
}
