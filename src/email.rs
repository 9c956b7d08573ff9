//! Message model handed to the transport.

use crate::client::DispatchReport;
use crate::errors::InvalidEmailError;
use crate::utils::{base64_bytes, extension_for_mime_type, guess_mime_type, is_valid_email};

/// Reporting-only header carrying the API response body after a successful send.
pub const RESPONSE_HEADER: &str = "X-Zepto-Response";
/// Reporting-only header carrying the (redacted) request headers after a successful send.
pub const REQUEST_HEADERS_HEADER: &str = "X-Zepto-Request-Headers";

/// Single recipient/sender with optional display name.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct User {
    pub email: String,
    pub name: Option<String>,
}

impl User {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }
    pub fn with_name(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: Some(name.into()),
        }
    }
}

/// Attachment part. `cid` or `inline` marks it as an embedded image.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Attachment {
    pub filename: Option<String>,
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
    pub mime_type: Option<String>,
    pub cid: Option<String>,
    #[serde(default)]
    pub inline: bool,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: Some(filename.into()),
            content: content.into(),
            mime_type: None,
            cid: None,
            inline: false,
        }
    }

    /// Embedded image referenced from HTML as `cid:<cid>`.
    pub fn inline_image(cid: impl Into<String>, content: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            filename: None,
            content: content.into(),
            mime_type: Some(mime_type.into()),
            cid: Some(cid.into()),
            inline: true,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_cid(mut self, cid: impl Into<String>) -> Self {
        self.cid = Some(cid.into());
        self
    }

    pub fn with_inline(mut self, inline: bool) -> Self {
        self.inline = inline;
        self
    }

    /// Token for `cid:` references: the explicit content-id, else the filename when
    /// only the inline marker is set.
    pub fn content_id(&self) -> Option<&str> {
        fn non_empty(value: &Option<String>) -> Option<&str> {
            value.as_deref().filter(|v| !v.is_empty())
        }
        match non_empty(&self.cid) {
            Some(cid) => Some(cid),
            None if self.inline => non_empty(&self.filename),
            None => None,
        }
    }

    /// Either signal is enough, as long as there is a content-id to reference.
    /// An inline marker with neither cid nor filename is sent as a regular attachment.
    pub fn is_inline(&self) -> bool {
        self.content_id().is_some()
    }

    /// Filename for a downloadable attachment, generated from the MIME type when unset.
    pub fn download_name(&self) -> String {
        match self.filename.as_deref().filter(|f| !f.is_empty()) {
            Some(name) => name.to_string(),
            None => format!("attachment.{}", extension_for_mime_type(&self.resolved_mime_type())),
        }
    }

    /// Explicit type, else guessed from the filename.
    pub fn resolved_mime_type(&self) -> String {
        match (&self.mime_type, &self.filename) {
            (Some(m), _) if !m.is_empty() => m.clone(),
            (_, Some(f)) => guess_mime_type(f).to_string(),
            _ => "application/octet-stream".to_string(),
        }
    }
}

/// Options to build an email.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EmailOptions {
    pub from: Recipient,
    pub to: Vec<Recipient>,
    #[serde(default)]
    pub reply_to: Vec<Recipient>,
    #[serde(default)]
    pub cc: Vec<Recipient>,
    #[serde(default)]
    pub bcc: Vec<Recipient>,
    #[serde(default)]
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
    /// Ordered name/value pairs; a name may repeat.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Default for EmailOptions {
    fn default() -> Self {
        Self {
            from: Recipient::Email(String::new()),
            to: vec![],
            reply_to: vec![],
            cc: vec![],
            bcc: vec![],
            subject: String::new(),
            text: None,
            html: None,
            headers: vec![],
            attachments: vec![],
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Recipient {
    Email(String),
    User(User),
}

/// Error when building an email.
#[derive(Debug, thiserror::Error)]
pub enum EmailBuildError {
    #[error(transparent)]
    InvalidEmail(#[from] InvalidEmailError),
}

impl From<String> for Recipient {
    fn from(s: String) -> Self {
        Recipient::Email(s)
    }
}

impl From<&str> for Recipient {
    fn from(s: &str) -> Self {
        Recipient::Email(s.to_string())
    }
}

impl From<User> for Recipient {
    fn from(u: User) -> Self {
        Recipient::User(u)
    }
}

impl From<&Recipient> for User {
    fn from(r: &Recipient) -> Self {
        match r {
            Recipient::Email(e) => User::new(e.clone()),
            Recipient::User(u) => u.clone(),
        }
    }
}

fn recipients_to_users(recipients: &[Recipient]) -> Vec<User> {
    recipients.iter().map(User::from).collect()
}

/// Validated email ready for mapping.
#[derive(Debug, Clone)]
pub struct Email {
    pub from: User,
    pub to: Vec<User>,
    pub reply_to: Vec<User>,
    pub cc: Vec<User>,
    pub bcc: Vec<User>,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<Attachment>,
    pub headers: Vec<(String, String)>,
}

impl Email {
    /// Resolves recipients and validates every address. A body is not required here.
    pub fn new(options: EmailOptions) -> Result<Self, EmailBuildError> {
        let from = User::from(&options.from);
        let to = recipients_to_users(&options.to);
        let reply_to = recipients_to_users(&options.reply_to);
        let cc = recipients_to_users(&options.cc);
        let bcc = recipients_to_users(&options.bcc);

        let invalid: Vec<String> = std::iter::once(&from)
            .chain(&to)
            .chain(&reply_to)
            .chain(&cc)
            .chain(&bcc)
            .filter(|u| !is_valid_email(&u.email))
            .map(|u| u.email.clone())
            .collect();
        if !invalid.is_empty() {
            return Err(InvalidEmailError::new(
                format!("Invalid email address(es): {}", invalid.join(", ")),
                invalid,
            )
            .into());
        }

        Ok(Self {
            from,
            to,
            reply_to,
            cc,
            bcc,
            subject: options.subject,
            text: options.text,
            html: options.html,
            attachments: options.attachments,
            headers: options.headers,
        })
    }

    /// Appends a header; existing values with the same name are kept.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Replaces every value of `name` (case-insensitive) with one value.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.remove_header(name);
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    /// Values of `name` in order of appearance (case-insensitive).
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Attaches the outcome of a successful send for downstream inspection.
    pub fn record_dispatch(&mut self, report: &DispatchReport) {
        self.set_header(RESPONSE_HEADER, report.response.to_string());
        let headers: serde_json::Map<String, serde_json::Value> = report
            .redacted_headers()
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect();
        self.set_header(REQUEST_HEADERS_HEADER, serde_json::Value::Object(headers).to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options() -> EmailOptions {
        EmailOptions {
            from: User::with_name("a@x.com", "Alice").into(),
            to: vec!["b@x.com".into()],
            subject: "Hi".into(),
            html: Some("<p>hi</p>".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_resolves_recipients() {
        let email = Email::new(options()).unwrap();
        assert_eq!(email.from, User::with_name("a@x.com", "Alice"));
        assert_eq!(email.to, vec![User::new("b@x.com")]);
        assert!(email.cc.is_empty());
    }

    #[test]
    fn test_new_collects_invalid_addresses() {
        let mut opts = options();
        opts.cc = vec!["bad".into()];
        opts.reply_to = vec!["also-bad@".into()];
        let err = Email::new(opts).unwrap_err();
        let EmailBuildError::InvalidEmail(e) = err;
        assert_eq!(e.invalid_emails, vec!["also-bad@".to_string(), "bad".to_string()]);
    }

    #[test]
    fn test_body_is_not_required() {
        let mut opts = options();
        opts.html = None;
        assert!(Email::new(opts).is_ok());
    }

    #[test]
    fn test_header_helpers() {
        let mut email = Email::new(options()).unwrap();
        email.add_header("X-Tag", "one");
        email.add_header("x-tag", "two");
        assert_eq!(email.header_values("X-TAG").collect::<Vec<_>>(), vec!["one", "two"]);
        email.set_header("X-Tag", "three");
        assert_eq!(email.header_values("x-tag").collect::<Vec<_>>(), vec!["three"]);
    }

    #[test]
    fn test_attachment_classification() {
        let plain = Attachment::new("a.pdf", vec![1, 2]);
        assert!(!plain.is_inline());
        assert_eq!(plain.resolved_mime_type(), "application/pdf");
        let by_cid = Attachment::new("logo.png", vec![1]).with_cid("logo");
        assert!(by_cid.is_inline());
        let by_flag = Attachment::new("logo.png", vec![1]).with_inline(true);
        assert!(by_flag.is_inline());
        assert_eq!(by_flag.content_id(), Some("logo.png"));
    }

    #[test]
    fn test_inline_marker_without_reference_is_regular() {
        let att = Attachment {
            filename: None,
            content: b"png".to_vec(),
            mime_type: Some("image/png".into()),
            cid: None,
            inline: true,
        };
        assert_eq!(att.content_id(), None);
        assert!(!att.is_inline());
        assert_eq!(att.download_name(), "attachment.png");
    }

    #[test]
    fn test_download_name() {
        assert_eq!(Attachment::new("a.pdf", vec![1]).download_name(), "a.pdf");
        let unnamed = Attachment {
            filename: Some(String::new()),
            content: vec![1],
            mime_type: None,
            cid: None,
            inline: false,
        };
        assert_eq!(unnamed.download_name(), "attachment.bin");
    }

    #[test]
    fn test_attachment_serde_uses_base64() {
        let att = Attachment::new("a.txt", b"hello".to_vec());
        let value = serde_json::to_value(&att).unwrap();
        assert_eq!(value["content"], json!("aGVsbG8="));
        let back: Attachment = serde_json::from_value(value).unwrap();
        assert_eq!(back, att);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let opts: EmailOptions = serde_json::from_value(json!({
            "from": {"email": "a@x.com", "name": "A"},
            "to": ["b@x.com"],
            "text": "hello"
        }))
        .unwrap();
        let email = Email::new(opts).unwrap();
        assert_eq!(email.from.name.as_deref(), Some("A"));
        assert!(email.subject.is_empty());
        assert!(email.headers.is_empty());
    }
}
