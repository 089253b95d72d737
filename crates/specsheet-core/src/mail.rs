//! Outbound email: MIME construction and the Gmail raw-send gateway.
//!
//! # Message layout
//!
//! ```text
//! To / Subject / MIME-Version / Content-Type: multipart/mixed; boundary=B
//!
//! --B            text/plain; charset=UTF-8 (body)
//! --B            <guessed type>; base64; attachment   (optional)
//! --B--
//! ```
//!
//! The whole message is base64url-encoded without padding for the
//! provider's raw-send call.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::{Result, SpecsheetError};

pub const BOUNDARY: &str = "specsheet_part_boundary";
pub const GMAIL_API_URL: &str = "https://gmail.googleapis.com";

/// RFC 5322 line-length limit, applied to the subject header.
pub const MAX_SUBJECT_BYTES: usize = 998;

const SERVICE: &str = "gmail";
const BASE64_LINE: usize = 76;

// ---------------------------------------------------------------------------
// EmailDraft
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub name: String,
    /// Standard base64, as supplied by the client.
    pub content_base64: String,
}

/// A validated message. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailDraft {
    to: String,
    subject: String,
    body: String,
    attachment: Option<Attachment>,
}

impl EmailDraft {
    pub fn new(
        to: &str,
        subject: &str,
        body: &str,
        attachment: Option<Attachment>,
    ) -> Result<Self> {
        let to = to.trim();
        let subject = subject.trim();
        if to.is_empty() || subject.is_empty() || body.trim().is_empty() {
            return Err(SpecsheetError::validation("to, subject and body are required"));
        }
        if has_line_break(to) || has_line_break(subject) {
            return Err(SpecsheetError::validation(
                "to and subject must be a single line",
            ));
        }
        if subject.len() > MAX_SUBJECT_BYTES {
            return Err(SpecsheetError::validation(format!(
                "subject exceeds {MAX_SUBJECT_BYTES} bytes"
            )));
        }
        if let Some(a) = &attachment {
            if a.name.trim().is_empty() || has_line_break(&a.name) {
                return Err(SpecsheetError::validation("attachment name is invalid"));
            }
            if STANDARD.decode(strip_whitespace(&a.content_base64)).is_err() {
                return Err(SpecsheetError::validation(
                    "attachment content must be base64",
                ));
            }
        }
        Ok(Self {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            attachment,
        })
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn has_attachment(&self) -> bool {
        self.attachment.is_some()
    }

    /// Render the full MIME message with CRLF line endings.
    pub fn to_mime(&self) -> String {
        let mut lines: Vec<String> = vec![
            format!("To: {}", self.to),
            format!("Subject: {}", encode_header(&self.subject)),
            "MIME-Version: 1.0".into(),
            format!("Content-Type: multipart/mixed; boundary={BOUNDARY}"),
            String::new(),
            format!("--{BOUNDARY}"),
            "Content-Type: text/plain; charset=UTF-8".into(),
            "Content-Transfer-Encoding: base64".into(),
            String::new(),
        ];
        let body = self.body.replace("\r\n", "\n").replace('\n', "\r\n");
        lines.extend(wrap_base64(&STANDARD.encode(body.as_bytes())));

        if let Some(a) = &self.attachment {
            let mime = mime_guess::from_path(&a.name)
                .first_raw()
                .unwrap_or("application/octet-stream");
            let name = a.name.replace('"', "");
            lines.push(format!("--{BOUNDARY}"));
            lines.push(format!("Content-Type: {mime}; name=\"{name}\""));
            lines.push("Content-Transfer-Encoding: base64".into());
            lines.push(format!("Content-Disposition: attachment; filename=\"{name}\""));
            lines.push(String::new());
            lines.extend(wrap_base64(&strip_whitespace(&a.content_base64)));
        }

        lines.push(format!("--{BOUNDARY}--"));
        lines.join("\r\n")
    }

    /// The MIME message as base64url without padding.
    pub fn to_raw(&self) -> String {
        base64url(self.to_mime().as_bytes())
    }
}

/// Standard base64 with `+`→`-`, `/`→`_`, and `=` padding stripped.
pub fn base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

fn has_line_break(s: &str) -> bool {
    s.contains('\r') || s.contains('\n')
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

fn wrap_base64(data: &str) -> Vec<String> {
    data.as_bytes()
        .chunks(BASE64_LINE)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect()
}

// ---------------------------------------------------------------------------
// Mailer
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a base64url-encoded message; returns the provider message id.
    async fn send_raw(&self, access_token: &str, raw: &str) -> Result<String>;
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

#[derive(Debug, Clone)]
pub struct GmailMailer {
    http: reqwest::Client,
    base_url: String,
}

impl Default for GmailMailer {
    fn default() -> Self {
        Self::new()
    }
}

impl GmailMailer {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: GMAIL_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// True when a provider error means the delegated credential is no longer
/// usable and the user must re-authorize.
pub fn is_grant_error(status: Option<u16>, detail: &str) -> bool {
    status == Some(401) || detail.contains("invalid_grant") || detail.contains("Invalid Credentials")
}

#[async_trait]
impl Mailer for GmailMailer {
    async fn send_raw(&self, access_token: &str, raw: &str) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/gmail/v1/users/me/messages/send", self.base_url))
            .bearer_auth(access_token)
            .json(&json!({ "raw": raw }))
            .send()
            .await
            .map_err(|e| SpecsheetError::transport(SERVICE, e))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            if is_grant_error(Some(status.as_u16()), &detail) {
                return Err(SpecsheetError::ReauthRequired(
                    "email authorization expired".into(),
                ));
            }
            return Err(SpecsheetError::upstream(SERVICE, Some(status.as_u16()), detail));
        }

        let body: SendResponse = resp
            .json()
            .await
            .map_err(|e| SpecsheetError::transport(SERVICE, e))?;
        Ok(body.id)
    }
}

// ---------------------------------------------------------------------------
// NotificationGateway
// ---------------------------------------------------------------------------

pub struct NotificationGateway {
    mailer: Arc<dyn Mailer>,
}

impl NotificationGateway {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    /// Send `draft` with the caller's delegated credential.
    ///
    /// A missing credential, or a provider error indicating an invalid or
    /// expired grant, yields `ReauthRequired`.
    pub async fn send_email(&self, credential: Option<&str>, draft: &EmailDraft) -> Result<String> {
        let Some(token) = credential.filter(|t| !t.trim().is_empty()) else {
            return Err(SpecsheetError::ReauthRequired(
                "email account not connected".into(),
            ));
        };

        let result = self.mailer.send_raw(token, &draft.to_raw()).await;
        let id = match result {
            Ok(id) => id,
            Err(SpecsheetError::Upstream { status, detail, .. }) if is_grant_error(status, &detail) => {
                return Err(SpecsheetError::ReauthRequired(
                    "email authorization expired".into(),
                ));
            }
            Err(e) => {
                warn!(error = %e, "email send failed");
                return Err(e);
            }
        };
        info!(
            to = draft.to(),
            attachment = draft.has_attachment(),
            message_id = %id,
            "email sent"
        );
        Ok(id)
    }
}
