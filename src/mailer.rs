//! ZeptoMail transport: options resolution, mapping and dispatch for one email.

use crate::client::{DispatchReport, ZeptoMailClient};
use crate::config::ZeptoMailConfig;
use crate::email::{Email, EmailOptions};
use crate::errors::{ConfigError, SendError};
use crate::http::{FetchBackend, HttpBackend};
use crate::options::SendOptions;
use crate::payload::{self, Endpoint, Payload};

/// Hooks for mailer events (not serialized).
#[derive(Default)]
pub struct ZeptoMailerHooks {
    pub on_sent: Option<Box<dyn Fn(&Email, &DispatchReport)>>,
    pub on_error: Option<Box<dyn Fn(&Email, &SendError)>>,
}

impl std::fmt::Debug for ZeptoMailerHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ZeptoMailerHooks")
    }
}

/// Sends [`Email`]s through the ZeptoMail HTTP API.
pub struct ZeptoMailer<B = FetchBackend> {
    client: ZeptoMailClient<B>,
    hooks: ZeptoMailerHooks,
}

impl ZeptoMailer<FetchBackend> {
    /// Mailer over Workers `fetch()`.
    pub fn new(config: ZeptoMailConfig) -> Result<Self, ConfigError> {
        Self::with_backend(config, FetchBackend)
    }

    /// Build, send, done.
    pub async fn send_once(
        config: ZeptoMailConfig,
        email_options: EmailOptions,
        options: SendOptions,
    ) -> Result<DispatchReport, worker::Error> {
        let mailer = Self::new(config).map_err(|e| worker::Error::RustError(e.to_string()))?;
        let mut email = Email::new(email_options).map_err(|e| worker::Error::RustError(e.to_string()))?;
        mailer
            .send(&mut email, options)
            .await
            .map_err(|e| worker::Error::RustError(e.to_string()))
    }
}

impl<B: HttpBackend> ZeptoMailer<B> {
    pub fn with_backend(config: ZeptoMailConfig, backend: B) -> Result<Self, ConfigError> {
        Ok(Self {
            client: ZeptoMailClient::new(config, backend)?,
            hooks: ZeptoMailerHooks::default(),
        })
    }

    pub fn with_hooks(mut self, hooks: ZeptoMailerHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn client(&self) -> &ZeptoMailClient<B> {
        &self.client
    }

    /// Header signals are overlaid by `options`, then config defaults fill the rest.
    pub fn prepare(&self, email: &Email, options: SendOptions) -> (Endpoint, Payload) {
        let resolved = options
            .or(SendOptions::from_headers(&email.headers))
            .resolve(&self.client.config().defaults);
        payload::build(email, &resolved)
    }

    /// Sends one email. On success the outcome is recorded on `email`.
    pub async fn send(&self, email: &mut Email, options: SendOptions) -> Result<DispatchReport, SendError> {
        let logger = self.client.logger().scoped(&uuid::Uuid::new_v4().to_string());
        let (endpoint, payload) = self.prepare(email, options);
        logger.info(&format!(
            "sending to {} recipient(s) via {}",
            payload.to.len() + payload.cc.len() + payload.bcc.len(),
            endpoint
        ));

        let result = match payload.to_value() {
            Ok(body) => self.client.post_with_logger(endpoint.path(), &body, &logger).await,
            Err(e) => Err(SendError::InvalidPayload(e.to_string())),
        };

        match result {
            Ok(report) => {
                logger.info(&format!(
                    "sent (request_id={})",
                    report.request_id().unwrap_or("-")
                ));
                email.record_dispatch(&report);
                if let Some(ref f) = self.hooks.on_sent {
                    f(email, &report);
                }
                Ok(report)
            }
            Err(err) => {
                if let Some(ref f) = self.hooks.on_error {
                    f(email, &err);
                }
                Err(err)
            }
        }
    }
}
