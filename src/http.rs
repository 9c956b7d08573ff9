//! HTTP seam between the API client and the runtime.
//!
//! [`FetchBackend`] is the Workers implementation. Anything else implementing
//! [`HttpBackend`] (a recording fake in tests, a native client elsewhere) can be
//! plugged into the client unchanged.

use crate::errors::TransportError;
use async_trait::async_trait;
use futures_util::future::{select, Either};
use std::future::Future;
use std::pin::pin;
use std::time::Duration;
use worker::wasm_bindgen::JsValue;
use worker::{AbortController, Delay, Fetch, Headers, Method, Request, RequestInit};

/// One outbound POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Wasm futures are not `Send`, hence `?Send`.
#[async_trait(?Send)]
pub trait HttpBackend {
    /// A single attempt bounded by `timeout`. Network failure and timeout are `Err`;
    /// any HTTP status is `Ok`.
    async fn post(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError>;

    /// Pause between attempts.
    async fn sleep(&self, duration: Duration);
}

/// `fetch()` from a Cloudflare Worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchBackend;

impl FetchBackend {
    fn build_request(request: &HttpRequest) -> worker::Result<Request> {
        let headers = Headers::new();
        for (name, value) in &request.headers {
            headers.set(name, value)?;
        }
        let mut init = RequestInit::new();
        init.with_method(Method::Post)
            .with_headers(headers)
            .with_body(Some(JsValue::from_str(&request.body)));
        Request::new_with_init(&request.url, &init)
    }
}

/// Runs `work` to completion unless `deadline` fires first (`None`).
pub(crate) async fn within_deadline<T, W, D>(work: W, deadline: D) -> Option<T>
where
    W: Future<Output = T>,
    D: Future<Output = ()>,
{
    match select(pin!(work), pin!(deadline)).await {
        Either::Left((output, _)) => Some(output),
        Either::Right(_) => None,
    }
}

#[async_trait(?Send)]
impl HttpBackend for FetchBackend {
    async fn post(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let req = Self::build_request(request).map_err(|e| TransportError::network(e.to_string()))?;
        let controller = AbortController::default();
        let signal = controller.signal();
        let call = Fetch::Request(req);

        // Status and body both fall inside the attempt's deadline.
        let attempt = async {
            let mut response = call
                .send_with_signal(&signal)
                .await
                .map_err(|e| TransportError::network(e.to_string()))?;
            let status = response.status_code();
            let body = response
                .text()
                .await
                .map_err(|e| TransportError::network(format!("failed to read response body: {}", e)))?;
            Ok::<_, TransportError>(HttpResponse { status, body })
        };

        match within_deadline(attempt, Delay::from(timeout)).await {
            Some(result) => result,
            None => {
                controller.abort();
                Err(TransportError::timeout(format!(
                    "request to {} timed out after {}ms",
                    request.url,
                    timeout.as_millis()
                )))
            }
        }
    }

    async fn sleep(&self, duration: Duration) {
        Delay::from(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::{pending, ready};

    #[test]
    fn test_is_success() {
        let response = |status| HttpResponse {
            status,
            body: String::new(),
        };
        assert!(response(200).is_success());
        assert!(response(201).is_success());
        assert!(!response(302).is_success());
        assert!(!response(500).is_success());
    }

    #[tokio::test]
    async fn test_deadline_covers_stalled_body() {
        let stalled_body = async {
            let status = 200u16;
            pending::<()>().await;
            status
        };
        assert_eq!(within_deadline(stalled_body, ready(())).await, None);
    }

    #[tokio::test]
    async fn test_finished_work_beats_pending_deadline() {
        let work = async { "done" };
        assert_eq!(within_deadline(work, pending::<()>()).await, Some("done"));
    }
}
