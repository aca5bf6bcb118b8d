//! Best-effort delivery of prescription documents over a WhatsApp relay.
//!
//! Delivery never affects persistence: the submit workflow records the
//! outcome and moves on.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Cannot reach messaging relay at {0}")]
    Connection(String),

    #[error("Messaging relay timed out after {0}s")]
    Timeout(u64),

    #[error("Messaging relay returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Messaging relay rejected the message: {0}")]
    Rejected(String),

    #[error("Patient has no phone number")]
    MissingPhone,

    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub success: bool,
    pub message_id: Option<String>,
}

/// Sends a document to a phone number.
pub trait MessageRelay: Send + Sync {
    fn send_document(
        &self,
        phone: &str,
        filename: &str,
        bytes: &[u8],
        caption: &str,
    ) -> Result<DeliveryReceipt, DeliveryError>;
}

/// Spacing and punctuation people type inside phone numbers.
static PHONE_FORMATTING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s\-().]").unwrap());

/// Optional international prefix followed by digits only.
static PHONE_SHAPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\+|00)?\d+$").unwrap());

/// Digits-only international number. Ten-digit local numbers (optionally
/// with a trunk `0`) get `default_country_code` prefixed; `+` and `00`
/// prefixes mark an already international number.
pub fn normalize_phone(raw: &str, default_country_code: &str) -> Result<String, DeliveryError> {
    let invalid = || DeliveryError::InvalidPhone(raw.to_string());
    let cleaned = PHONE_FORMATTING.replace_all(raw.trim(), "");
    if cleaned.is_empty() {
        return Err(DeliveryError::MissingPhone);
    }
    let caps = PHONE_SHAPE.captures(&cleaned).ok_or_else(invalid)?;
    let international = caps.get(1).is_some();
    let digits = cleaned.trim_start_matches('+');
    let digits = if international {
        digits.strip_prefix("00").unwrap_or(digits)
    } else {
        digits
    };

    let number = if international {
        digits.to_string()
    } else if digits.len() == 10 {
        format!("{default_country_code}{digits}")
    } else if digits.len() == 11 && digits.starts_with('0') {
        format!("{default_country_code}{}", &digits[1..])
    } else {
        digits.to_string()
    };

    if !(8..=15).contains(&number.len()) {
        return Err(invalid());
    }
    Ok(number)
}

// ─── WhatsApp relay ───────────────────────────────────────────────────────────

/// HTTP relay accepting `multipart/form-data` with `phone`, `caption` and
/// `file` parts and answering `{"success": bool, "messageId": "..."}`.
pub struct WhatsAppRelay {
    endpoint: String,
    token: Option<String>,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayResponse {
    success: bool,
    message_id: Option<String>,
    error: Option<String>,
}

impl WhatsAppRelay {
    pub fn new(endpoint: &str, token: Option<&str>, timeout_secs: u64) -> Result<Self, DeliveryError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DeliveryError::Client(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            token: token.map(String::from),
            client,
            timeout_secs,
        })
    }
}

impl MessageRelay for WhatsAppRelay {
    fn send_document(
        &self,
        phone: &str,
        filename: &str,
        bytes: &[u8],
        caption: &str,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let file = reqwest::blocking::multipart::Part::bytes(bytes.to_vec())
            .file_name(filename.to_string())
            .mime_str("application/pdf")
            .map_err(|e| DeliveryError::Client(e.to_string()))?;
        let form = reqwest::blocking::multipart::Form::new()
            .text("phone", phone.to_string())
            .text("caption", caption.to_string())
            .part("file", file);

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| {
            if e.is_connect() {
                DeliveryError::Connection(self.endpoint.clone())
            } else if e.is_timeout() {
                DeliveryError::Timeout(self.timeout_secs)
            } else {
                DeliveryError::Client(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: RelayResponse = response
            .json()
            .map_err(|e| DeliveryError::Client(format!("Unreadable relay response: {e}")))?;
        if !parsed.success {
            return Err(DeliveryError::Rejected(
                parsed.error.unwrap_or_else(|| "no reason given".into()),
            ));
        }

        Ok(DeliveryReceipt {
            success: true,
            message_id: parsed.message_id,
        })
    }
}

// ─── Test double ──────────────────────────────────────────────────────────────

/// Relay that records sends and answers with a fixed outcome.
#[cfg(test)]
pub struct MockRelay {
    pub fail: bool,
    /// Simulated relay latency per send.
    pub delay: Option<Duration>,
    sent: std::sync::Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
impl MockRelay {
    pub fn new() -> Self {
        Self { fail: false, delay: None, sent: Default::default() }
    }

    pub fn failing() -> Self {
        Self { fail: true, delay: None, sent: Default::default() }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `(phone, filename)` of every send attempt.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl MessageRelay for MockRelay {
    fn send_document(
        &self,
        phone: &str,
        filename: &str,
        _bytes: &[u8],
        _caption: &str,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.sent.lock().unwrap().push((phone.to_string(), filename.to_string()));
        if self.fail {
            return Err(DeliveryError::Rejected("mock failure".into()));
        }
        Ok(DeliveryReceipt {
            success: true,
            message_id: Some("wamid-1".into()),
        })
    }
}
