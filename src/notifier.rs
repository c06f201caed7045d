//! SMS to the owner, with every attempt written to the audit log.

use igsms_core::{error::IgsmsError, message::OutgoingMessage, traits::Channel};
use igsms_memory::audit::{AuditEntry, AuditLogger, AuditStatus, Direction};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct Notifier {
    channel: Arc<dyn Channel>,
    owner_phone: String,
    audit: AuditLogger,
}

impl Notifier {
    pub fn new(channel: Arc<dyn Channel>, owner_phone: &str, audit: AuditLogger) -> Self {
        Self {
            channel,
            owner_phone: owner_phone.trim().to_string(),
            audit,
        }
    }

    pub fn owner_phone(&self) -> &str {
        &self.owner_phone
    }

    /// Send `text` to the owner.
    pub async fn notify(&self, text: &str) -> Result<(), IgsmsError> {
        let result = self
            .channel
            .send(OutgoingMessage::to(&self.owner_phone, text))
            .await;

        let (status, detail) = match &result {
            Ok(()) => (AuditStatus::Ok, None),
            Err(e) => {
                warn!("SMS via {} failed: {e}", self.channel.name());
                (AuditStatus::Error, Some(e.to_string()))
            }
        };
        let entry = AuditEntry {
            direction: Direction::Outbound,
            counterparty: self.owner_phone.clone(),
            body: text.to_string(),
            status,
            detail,
        };
        if let Err(e) = self.audit.log(&entry).await {
            warn!("audit log failed: {e}");
        }

        result
    }

    /// Record an inbound SMS.
    pub async fn audit_inbound(&self, from: &str, body: &str, status: AuditStatus) {
        let entry = AuditEntry {
            direction: Direction::Inbound,
            counterparty: from.to_string(),
            body: body.to_string(),
            status,
            detail: (status == AuditStatus::Denied).then(|| "sender is not the owner".to_string()),
        };
        if let Err(e) = self.audit.log(&entry).await {
            warn!("audit log failed: {e}");
        }
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }
}
