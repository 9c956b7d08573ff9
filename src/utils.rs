//! Address validation, flag parsing and encoding helpers.

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use regex::Regex;
use std::sync::OnceLock;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .unwrap()
    })
}

/// Validates email format (RFC 5322 simplified).
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || !email_regex().is_match(email) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.len() > 64 || domain.len() > 255 || !domain.contains('.') {
        return false;
    }
    let tld = domain.rsplit('.').next().unwrap_or("");
    tld.len() >= 2
}

/// Returns invalid emails from a list.
pub fn validate_emails(emails: &[String]) -> Vec<String> {
    emails
        .iter()
        .filter(|e| !is_valid_email(e))
        .cloned()
        .collect()
}

/// `1`, `true`, `yes`, `on` (any case, surrounding whitespace ignored).
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Tri-state flag: truthy, falsy (`0`, `false`, `no`, `off`), or unrecognized.
pub fn parse_flag(value: &str) -> Option<bool> {
    if is_truthy(value) {
        return Some(true);
    }
    match value.trim().to_ascii_lowercase().as_str() {
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn encode_base64(bytes: &[u8]) -> String {
    B64.encode(bytes)
}

pub fn decode_base64(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    B64.decode(text)
}

/// MIME type from the filename extension.
pub fn guess_mime_type(filename: &str) -> &'static str {
    let ext = match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => return "application/octet-stream",
    };
    match ext.as_str() {
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "ics" => "text/calendar",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

/// File extension for a MIME type (inverse of [`guess_mime_type`]), `bin` when unknown.
pub fn extension_for_mime_type(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.as_str() {
        "text/plain" => "txt",
        "text/html" => "html",
        "text/csv" => "csv",
        "text/calendar" => "ics",
        "application/pdf" => "pdf",
        "application/json" => "json",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        "image/webp" => "webp",
        "application/zip" => "zip",
        _ => "bin",
    }
}

/// Serde adapter carrying raw bytes as a base64 string (queue payloads stay compact).
pub mod base64_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_base64(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::decode_base64(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last+tag@mail.example.org"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("invalid"));
        assert!(!is_valid_email("a@localhost"));
        assert!(!is_valid_email("a@b.c"));
    }

    #[test]
    fn test_validate_emails() {
        let list = vec!["a@x.com".to_string(), "nope".to_string()];
        assert_eq!(validate_emails(&list), vec!["nope".to_string()]);
    }

    #[test]
    fn test_flags() {
        for token in ["1", "true", "YES", " on "] {
            assert!(is_truthy(token), "{token}");
            assert_eq!(parse_flag(token), Some(true));
        }
        for token in ["0", "False", "no", "OFF"] {
            assert!(!is_truthy(token));
            assert_eq!(parse_flag(token), Some(false));
        }
        assert_eq!(parse_flag("maybe"), None);
        assert!(!is_truthy(""));
    }

    #[test]
    fn test_guess_mime_type() {
        assert_eq!(guess_mime_type("report.PDF"), "application/pdf");
        assert_eq!(guess_mime_type("logo.png"), "image/png");
        assert_eq!(guess_mime_type("README"), "application/octet-stream");
    }

    #[test]
    fn test_extension_for_mime_type() {
        assert_eq!(extension_for_mime_type("image/PNG"), "png");
        assert_eq!(extension_for_mime_type("text/plain; charset=utf-8"), "txt");
        assert_eq!(extension_for_mime_type("application/x-unknown"), "bin");
    }

    #[test]
    fn test_base64() {
        assert_eq!(encode_base64(b"hello"), "aGVsbG8=");
        assert_eq!(decode_base64("aGVsbG8=").unwrap(), b"hello");
    }
}
