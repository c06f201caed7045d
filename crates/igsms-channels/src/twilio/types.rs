//! Twilio REST API deserialization types.

use serde::Deserialize;

/// A created message resource (only the fields we log).
#[derive(Debug, Deserialize)]
pub(crate) struct TwMessage {
    pub sid: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct TwError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}
