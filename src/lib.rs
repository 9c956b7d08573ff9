//! worker-zeptomail — Send emails through the ZeptoMail HTTP API from Cloudflare Workers (Rust).
//!
//! An [`Email`] plus [`SendOptions`] is mapped onto one of four API payloads
//! (single or batch, plain or templated) and POSTed with a fixed-delay retry.

pub mod client;
pub mod config;
pub mod email;
pub mod errors;
pub mod http;
pub mod logger;
pub mod mailer;
pub mod options;
pub mod payload;
pub mod queue;
pub mod utils;

// Re-exports
pub use client::{DispatchReport, ZeptoMailClient, AUTH_SCHEME};
pub use config::{Defaults, ZeptoMailConfig, DEFAULT_BASE_URL};
pub use email::{Attachment, Email, EmailBuildError, EmailOptions, Recipient, User};
pub use errors::{ApiError, ConfigError, HttpStatusError, InvalidEmailError, SendError, TransportError};
pub use http::{FetchBackend, HttpBackend, HttpRequest, HttpResponse};
pub use logger::{LogLevel, Logger};
pub use mailer::{ZeptoMailer, ZeptoMailerHooks};
pub use options::{MergeVars, ResolvedOptions, SendOptions, TemplateRef};
pub use payload::{Endpoint, Payload};
pub use queue::{enqueue_email, enqueue_emails, process_batch, process_message, QueueEmailMessage, QueueProcessResult};
pub use utils::{is_truthy, is_valid_email, parse_flag, validate_emails};
