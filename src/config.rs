//! Transport configuration.

use crate::errors::ConfigError;
use crate::logger::LogLevel;
use crate::utils::parse_flag;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.zeptomail.com";

/// Static per-send defaults, used when neither explicit options nor headers set a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub template: Option<String>,
    pub bounce_address: Option<String>,
    pub track_opens: Option<bool>,
    pub track_clicks: Option<bool>,
    pub client_reference: Option<String>,
    pub force_batch: bool,
}

/// Options to create a ZeptoMail transport.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct ZeptoMailConfig {
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Total attempts per send, first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default)]
    pub defaults: Defaults,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    100
}

impl Default for ZeptoMailConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            log_level: LogLevel::Info,
            defaults: Defaults::default(),
        }
    }
}

impl std::fmt::Debug for ZeptoMailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZeptoMailConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("log_level", &self.log_level)
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl ZeptoMailConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Missing key is fatal, before any send.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError("ZeptoMail API key is missing".into()));
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError("ZeptoMail base URL is missing".into()));
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Builds the config from a lookup function (`name -> value`), skipping blanks.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let number = |name: &str| -> Result<Option<u64>, ConfigError> {
            get(name)
                .map(|v| {
                    v.parse::<u64>()
                        .map_err(|_| ConfigError(format!("{} must be a non-negative integer, got {:?}", name, v)))
                })
                .transpose()
        };

        let defaults = ZeptoMailConfig::default();
        let config = Self {
            api_key: get("ZEPTOMAIL_API_KEY").unwrap_or_default(),
            base_url: get("ZEPTOMAIL_REGION_URL").unwrap_or(defaults.base_url),
            timeout_secs: number("ZEPTOMAIL_TIMEOUT")?.unwrap_or(defaults.timeout_secs),
            max_attempts: number("ZEPTOMAIL_RETRIES")?
                .map(|n| {
                    u32::try_from(n)
                        .map_err(|_| ConfigError(format!("ZEPTOMAIL_RETRIES is out of range, got {}", n)))
                })
                .transpose()?
                .unwrap_or(defaults.max_attempts),
            retry_delay_ms: number("ZEPTOMAIL_RETRY_DELAY_MS")?.unwrap_or(defaults.retry_delay_ms),
            log_level: get("ZEPTOMAIL_LOG_LEVEL")
                .map(|v| v.parse::<LogLevel>().map_err(ConfigError))
                .transpose()?
                .unwrap_or_default(),
            defaults: Defaults {
                template: get("ZEPTOMAIL_TEMPLATE"),
                bounce_address: get("ZEPTOMAIL_BOUNCE_ADDRESS"),
                track_opens: get("ZEPTOMAIL_TRACK_OPENS").and_then(|v| parse_flag(&v)),
                track_clicks: get("ZEPTOMAIL_TRACK_CLICKS").and_then(|v| parse_flag(&v)),
                client_reference: get("ZEPTOMAIL_CLIENT_REFERENCE"),
                force_batch: get("ZEPTOMAIL_FORCE_BATCH")
                    .and_then(|v| parse_flag(&v))
                    .unwrap_or(false),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads the Worker environment. The API key may be a secret or a plain var.
    pub fn from_env(env: &worker::Env) -> Result<Self, ConfigError> {
        Self::from_lookup(|name| {
            env.secret(name)
                .map(|s| s.to_string())
                .or_else(|_| env.var(name).map(|v| v.to_string()))
                .ok()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_key_is_fatal() {
        assert!(ZeptoMailConfig::default().validate().is_err());
        assert!(ZeptoMailConfig::new("   ").validate().is_err());
        assert!(ZeptoMailConfig::new("k").validate().is_ok());
    }

    #[test]
    fn test_serde_defaults() {
        let config: ZeptoMailConfig = serde_json::from_str(r#"{"api_key":"k"}"#).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.attempts(), 3);
        assert_eq!(config.retry_delay(), Duration::from_millis(100));
        assert_eq!(config.defaults, Defaults::default());
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let config = ZeptoMailConfig {
            base_url: "https://api.zeptomail.eu/".into(),
            ..ZeptoMailConfig::new("k")
        };
        assert_eq!(config.base_url(), "https://api.zeptomail.eu");
    }

    #[test]
    fn test_zero_attempts_still_sends_once() {
        let config = ZeptoMailConfig {
            max_attempts: 0,
            ..ZeptoMailConfig::new("k")
        };
        assert_eq!(config.attempts(), 1);
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", ZeptoMailConfig::new("secret-key"));
        assert!(!rendered.contains("secret-key"));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("ZEPTOMAIL_API_KEY", "k"),
            ("ZEPTOMAIL_REGION_URL", "https://api.zeptomail.in"),
            ("ZEPTOMAIL_TIMEOUT", "5"),
            ("ZEPTOMAIL_RETRIES", "2"),
            ("ZEPTOMAIL_TRACK_OPENS", "true"),
            ("ZEPTOMAIL_FORCE_BATCH", "1"),
            ("ZEPTOMAIL_TEMPLATE", " "),
        ]
        .into_iter()
        .collect();
        let config = ZeptoMailConfig::from_lookup(|n| vars.get(n).map(|v| v.to_string())).unwrap();
        assert_eq!(config.base_url, "https://api.zeptomail.in");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.defaults.track_opens, Some(true));
        assert!(config.defaults.force_batch);
        assert_eq!(config.defaults.template, None);
    }

    #[test]
    fn test_from_lookup_rejects_bad_numbers_and_missing_key() {
        let bad = ZeptoMailConfig::from_lookup(|n| match n {
            "ZEPTOMAIL_API_KEY" => Some("k".into()),
            "ZEPTOMAIL_TIMEOUT" => Some("soon".into()),
            _ => None,
        });
        assert!(bad.is_err());
        assert!(ZeptoMailConfig::from_lookup(|_| None).is_err());

        let huge = ZeptoMailConfig::from_lookup(|n| match n {
            "ZEPTOMAIL_API_KEY" => Some("k".into()),
            "ZEPTOMAIL_RETRIES" => Some("4294967296".into()),
            _ => None,
        });
        assert!(huge.unwrap_err().0.contains("ZEPTOMAIL_RETRIES"));
    }
}
