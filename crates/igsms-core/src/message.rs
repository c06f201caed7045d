use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An inbound SMS delivered by the gateway webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Channel name (e.g. "twilio").
    pub channel: String,
    /// Sender phone number as reported by the gateway.
    pub sender_id: String,
    /// Message body, trimmed.
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Gateway-assigned message identifier, when present.
    #[serde(default)]
    pub provider_id: Option<String>,
}

/// An outgoing SMS.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    /// Destination phone number.
    #[serde(default)]
    pub reply_target: Option<String>,
}

impl OutgoingMessage {
    /// Build a message addressed to `target`.
    pub fn to(target: &str, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reply_target: Some(target.to_string()),
        }
    }
}
