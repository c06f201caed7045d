//! Inbound webhook payloads.

use chrono::Utc;
use igsms_core::message::IncomingMessage;
use std::collections::BTreeMap;

/// Turn the webhook form fields into an [`IncomingMessage`].
/// Returns `None` when there is no `From`.
pub fn parse_inbound(params: &BTreeMap<String, String>) -> Option<IncomingMessage> {
    let from = params.get("From").map(|f| f.trim()).filter(|f| !f.is_empty())?;
    Some(IncomingMessage {
        channel: "twilio".to_string(),
        sender_id: from.to_string(),
        text: params
            .get("Body")
            .map(|b| b.trim().to_string())
            .unwrap_or_default(),
        timestamp: Utc::now(),
        provider_id: params.get("MessageSid").cloned(),
    })
}
