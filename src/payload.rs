//! Maps an [`Email`] plus resolved options onto one of the four ZeptoMail payloads.
//!
//! | template | batch | endpoint |
//! |----------|-------|----------|
//! | no  | no  | `/v1.1/email` |
//! | no  | yes | `/v1.1/email/batch` |
//! | yes | no  | `/v1.1/email/template` |
//! | yes | yes | `/v1.1/email/template/batch` |
//!
//! Unset fields are omitted, never sent as `null` or empty.

use crate::email::{Attachment, Email, User, REQUEST_HEADERS_HEADER, RESPONSE_HEADER};
use crate::options::{is_control_header, MergeVars, ResolvedOptions, TemplateRef};
use crate::utils::encode_base64;
use serde::Serialize;
use std::collections::BTreeMap;

/// Standard addressing/content headers the API builds itself.
const RESERVED_HEADERS: [&str; 11] = [
    "From",
    "To",
    "Cc",
    "Bcc",
    "Reply-To",
    "Subject",
    "Content-Type",
    "Content-Transfer-Encoding",
    "MIME-Version",
    "Message-ID",
    "Date",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Single,
    Batch,
    Template,
    TemplateBatch,
}

impl Endpoint {
    pub fn select(templated: bool, batch: bool) -> Self {
        match (templated, batch) {
            (false, false) => Endpoint::Single,
            (false, true) => Endpoint::Batch,
            (true, false) => Endpoint::Template,
            (true, true) => Endpoint::TemplateBatch,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Single => "/v1.1/email",
            Endpoint::Batch => "/v1.1/email/batch",
            Endpoint::Template => "/v1.1/email/template",
            Endpoint::TemplateBatch => "/v1.1/email/template/batch",
        }
    }

    pub fn is_templated(self) -> bool {
        matches!(self, Endpoint::Template | Endpoint::TemplateBatch)
    }

    pub fn is_batch(self) -> bool {
        matches!(self, Endpoint::Batch | Endpoint::TemplateBatch)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Address {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<&User> for Address {
    fn from(user: &User) -> Self {
        Self {
            address: user.email.clone(),
            name: user.name.clone().filter(|n| !n.is_empty()),
        }
    }
}

/// `to`/`cc`/`bcc` entry: the address is wrapped, unlike `reply_to`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipientEntry {
    pub email_address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_info: Option<MergeVars>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileEntry {
    pub content: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payload {
    pub from: Address,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<RecipientEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<RecipientEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<RecipientEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reply_to: Vec<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub htmlbody: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub textbody: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<FileEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inline_images: Vec<FileEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_opens: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_clicks: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_reference: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub mime_headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_info: Option<MergeVars>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounce_address: Option<String>,
}

impl Payload {
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.is_empty())
}

fn entries(users: &[User]) -> Vec<RecipientEntry> {
    users
        .iter()
        .map(|u| RecipientEntry {
            email_address: u.into(),
            merge_info: None,
        })
        .collect()
}

fn file_entry(attachment: &Attachment) -> FileEntry {
    let cid = attachment.content_id().map(str::to_string);
    FileEntry {
        content: encode_base64(&attachment.content),
        mime_type: attachment.resolved_mime_type(),
        name: if cid.is_some() { None } else { Some(attachment.download_name()) },
        cid,
    }
}

/// True for headers the mapper must not forward.
pub fn is_excluded_header(name: &str) -> bool {
    RESERVED_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
        || is_control_header(name)
        || name.eq_ignore_ascii_case(RESPONSE_HEADER)
        || name.eq_ignore_ascii_case(REQUEST_HEADERS_HEADER)
}

/// Residual headers; repeated names (case-insensitive) are joined with `, `
/// under the first spelling seen.
pub fn residual_headers(headers: &[(String, String)]) -> BTreeMap<String, String> {
    let mut grouped: Vec<(String, Vec<&str>)> = Vec::new();
    for (name, value) in headers.iter().filter(|(k, _)| !is_excluded_header(k)) {
        match grouped.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some((_, values)) => values.push(value.as_str()),
            None => grouped.push((name.clone(), vec![value.as_str()])),
        }
    }
    grouped
        .into_iter()
        .map(|(name, values)| (name, values.join(", ")))
        .collect()
}

/// Chooses the endpoint and builds its payload. Pure.
pub fn build(email: &Email, options: &ResolvedOptions) -> (Endpoint, Payload) {
    let endpoint = Endpoint::select(options.template.is_some(), options.batch);

    let mut to = entries(&email.to);
    if endpoint.is_batch() {
        if let Some(per_recipient) = &options.per_recipient_merge_info {
            for entry in &mut to {
                entry.merge_info = per_recipient.get(&entry.email_address.address).cloned();
            }
        }
    }

    let (inline, regular): (Vec<&Attachment>, Vec<&Attachment>) =
        email.attachments.iter().partition(|a| a.is_inline());

    let mut payload = Payload {
        from: (&email.from).into(),
        to,
        cc: entries(&email.cc),
        bcc: entries(&email.bcc),
        reply_to: email.reply_to.iter().map(Address::from).collect(),
        subject: Some(email.subject.clone()).filter(|s| !s.is_empty()),
        htmlbody: present(&email.html),
        textbody: present(&email.text),
        attachments: regular.into_iter().map(file_entry).collect(),
        inline_images: inline.into_iter().map(file_entry).collect(),
        track_opens: options.track_opens,
        track_clicks: options.track_clicks,
        client_reference: options.client_reference.clone(),
        mime_headers: residual_headers(&email.headers),
        template_key: None,
        template_alias: None,
        merge_info: None,
        bounce_address: None,
    };

    if let Some(template) = &options.template {
        match template {
            TemplateRef::Key(key) => payload.template_key = Some(key.clone()),
            TemplateRef::Alias(alias) => payload.template_alias = Some(alias.clone()),
        }
        payload.merge_info = options.merge_info.clone();
        payload.bounce_address = options.bounce_address.clone();
    }

    (endpoint, payload)
}
