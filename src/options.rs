//! Per-send control options.
//!
//! Options are normally passed explicitly as [`SendOptions`]. For callers that can only
//! hand over a composed message, the same options may travel in private `X-Zepto-*`
//! headers; [`SendOptions::from_headers`] reads them and the payload mapper never
//! forwards them.

use crate::config::Defaults;
use crate::utils::{is_truthy, parse_flag};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const TEMPLATE_HEADER: &str = "X-Zepto-Template";
pub const MERGE_INFO_HEADER: &str = "X-Zepto-MergeInfo";
pub const PER_RECIPIENT_MERGE_INFO_HEADER: &str = "X-Zepto-PerRecipient-MergeInfo";
pub const BATCH_HEADER: &str = "X-Zepto-Batch";
pub const TRACK_OPENS_HEADER: &str = "X-Zepto-Track-Opens";
pub const TRACK_CLICKS_HEADER: &str = "X-Zepto-Track-Clicks";
pub const CLIENT_REFERENCE_HEADER: &str = "X-Zepto-Client-Reference";
pub const BOUNCE_ADDRESS_HEADER: &str = "X-Zepto-Bounce-Address";

pub const CONTROL_HEADERS: [&str; 8] = [
    TEMPLATE_HEADER,
    MERGE_INFO_HEADER,
    PER_RECIPIENT_MERGE_INFO_HEADER,
    BATCH_HEADER,
    TRACK_OPENS_HEADER,
    TRACK_CLICKS_HEADER,
    CLIENT_REFERENCE_HEADER,
    BOUNCE_ADDRESS_HEADER,
];

/// Template keys start with this literal; anything else is an alias.
pub const TEMPLATE_KEY_PREFIX: &str = "ea";

/// Merge variables: a flat JSON object.
pub type MergeVars = Map<String, Value>;

/// Server-side template reference.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum TemplateRef {
    Key(String),
    Alias(String),
}

impl TemplateRef {
    /// Guesses the form from the prefix. Misclassification only changes the field name.
    pub fn infer(id: impl Into<String>) -> Self {
        let id = id.into();
        if id.starts_with(TEMPLATE_KEY_PREFIX) {
            TemplateRef::Key(id)
        } else {
            TemplateRef::Alias(id)
        }
    }

    pub fn id(&self) -> &str {
        match self {
            TemplateRef::Key(id) | TemplateRef::Alias(id) => id,
        }
    }
}

/// Explicit per-send options. Unset fields fall back to header signals, then config.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SendOptions {
    pub template: Option<TemplateRef>,
    pub merge_info: Option<MergeVars>,
    /// Keyed by the exact recipient address string.
    pub per_recipient_merge_info: Option<BTreeMap<String, MergeVars>>,
    pub batch: bool,
    pub track_opens: Option<bool>,
    pub track_clicks: Option<bool>,
    pub client_reference: Option<String>,
    pub bounce_address: Option<String>,
}

fn first_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Object or nothing. Invalid JSON is treated as absent.
fn decode_object(raw: &str) -> Option<MergeVars> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Address -> object map; entries whose value is not an object are dropped.
fn decode_per_recipient(raw: &str) -> Option<BTreeMap<String, MergeVars>> {
    let map: BTreeMap<String, MergeVars> = decode_object(raw)?
        .into_iter()
        .filter_map(|(address, vars)| match vars {
            Value::Object(vars) => Some((address, vars)),
            _ => None,
        })
        .collect();
    Some(map)
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn template(mut self, template: TemplateRef) -> Self {
        self.template = Some(template);
        self
    }

    pub fn merge_info(mut self, vars: MergeVars) -> Self {
        self.merge_info = Some(vars);
        self
    }

    pub fn recipient_merge_info(mut self, address: impl Into<String>, vars: MergeVars) -> Self {
        self.per_recipient_merge_info
            .get_or_insert_with(BTreeMap::new)
            .insert(address.into(), vars);
        self
    }

    pub fn batch(mut self, batch: bool) -> Self {
        self.batch = batch;
        self
    }

    pub fn track_opens(mut self, on: bool) -> Self {
        self.track_opens = Some(on);
        self
    }

    pub fn track_clicks(mut self, on: bool) -> Self {
        self.track_clicks = Some(on);
        self
    }

    pub fn client_reference(mut self, reference: impl Into<String>) -> Self {
        self.client_reference = Some(reference.into());
        self
    }

    pub fn bounce_address(mut self, address: impl Into<String>) -> Self {
        self.bounce_address = Some(address.into());
        self
    }

    /// Reads the `X-Zepto-*` control headers (exact, case-sensitive names).
    pub fn from_headers(headers: &[(String, String)]) -> Self {
        Self {
            template: first_value(headers, TEMPLATE_HEADER).map(TemplateRef::infer),
            merge_info: first_value(headers, MERGE_INFO_HEADER).and_then(decode_object),
            per_recipient_merge_info: first_value(headers, PER_RECIPIENT_MERGE_INFO_HEADER)
                .and_then(decode_per_recipient),
            batch: first_value(headers, BATCH_HEADER).is_some_and(is_truthy),
            track_opens: first_value(headers, TRACK_OPENS_HEADER).and_then(parse_flag),
            track_clicks: first_value(headers, TRACK_CLICKS_HEADER).and_then(parse_flag),
            client_reference: non_empty(first_value(headers, CLIENT_REFERENCE_HEADER)),
            bounce_address: non_empty(first_value(headers, BOUNCE_ADDRESS_HEADER)),
        }
    }

    /// Field-wise overlay: values set on `self` win over `fallback`.
    pub fn or(self, fallback: SendOptions) -> Self {
        Self {
            template: self.template.or(fallback.template),
            merge_info: self.merge_info.or(fallback.merge_info),
            per_recipient_merge_info: self
                .per_recipient_merge_info
                .or(fallback.per_recipient_merge_info),
            batch: self.batch || fallback.batch,
            track_opens: self.track_opens.or(fallback.track_opens),
            track_clicks: self.track_clicks.or(fallback.track_clicks),
            client_reference: self.client_reference.or(fallback.client_reference),
            bounce_address: self.bounce_address.or(fallback.bounce_address),
        }
    }

    /// Applies configured defaults once, at call time.
    pub fn resolve(self, defaults: &Defaults) -> ResolvedOptions {
        let per_recipient_merge_info = self.per_recipient_merge_info.filter(|m| !m.is_empty());
        let batch = self.batch || defaults.force_batch || per_recipient_merge_info.is_some();
        ResolvedOptions {
            template: self
                .template
                .filter(|t| !t.id().is_empty())
                .or_else(|| non_empty(defaults.template.as_deref()).map(TemplateRef::infer)),
            merge_info: self.merge_info,
            per_recipient_merge_info,
            batch,
            track_opens: self.track_opens.or(defaults.track_opens),
            track_clicks: self.track_clicks.or(defaults.track_clicks),
            client_reference: non_empty(self.client_reference.as_deref())
                .or_else(|| non_empty(defaults.client_reference.as_deref())),
            bounce_address: non_empty(self.bounce_address.as_deref())
                .or_else(|| non_empty(defaults.bounce_address.as_deref())),
        }
    }
}

/// Options after defaults; read-only input to the payload mapper.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedOptions {
    pub template: Option<TemplateRef>,
    pub merge_info: Option<MergeVars>,
    pub per_recipient_merge_info: Option<BTreeMap<String, MergeVars>>,
    pub batch: bool,
    pub track_opens: Option<bool>,
    pub track_clicks: Option<bool>,
    pub client_reference: Option<String>,
    pub bounce_address: Option<String>,
}

/// Names the mapper must never forward (control signals, compared case-insensitively).
pub fn is_control_header(name: &str) -> bool {
    CONTROL_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}
