//! Outbound SMS and the Channel trait implementation.

use super::types::{TwError, TwMessage};
use super::{TwilioChannel, MAX_SMS_CHARS};
use crate::utils::split_message;
use async_trait::async_trait;
use igsms_core::{error::IgsmsError, message::OutgoingMessage, traits::Channel};
use tracing::{debug, info};

impl TwilioChannel {
    /// Send a text message to a phone number, split into gateway-sized parts.
    pub async fn send_text(&self, to: &str, text: &str) -> Result<(), IgsmsError> {
        for chunk in split_message(text, MAX_SMS_CHARS) {
            let params = [
                ("To", to),
                ("From", self.config.from_number.as_str()),
                ("Body", chunk),
            ];

            let resp = self
                .client
                .post(&self.messages_url)
                .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
                .form(&params)
                .send()
                .await
                .map_err(|e| IgsmsError::Sms(format!("twilio send failed: {e}")))?;

            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();

            if !status.is_success() {
                return Err(IgsmsError::Sms(describe_error(status.as_u16(), &body)));
            }

            match serde_json::from_str::<TwMessage>(&body) {
                Ok(msg) => debug!(
                    "twilio accepted {} ({})",
                    msg.sid,
                    msg.status.as_deref().unwrap_or("unknown")
                ),
                Err(e) => debug!("twilio accepted message, unparsed body: {e}"),
            }
        }

        info!("sms sent to {to}");
        Ok(())
    }
}

/// Render a Twilio error response as a single line.
pub(super) fn describe_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<TwError>(body) {
        Ok(TwError {
            code: Some(code),
            message: Some(message),
        }) => format!("twilio send failed ({status}, code {code}): {message}"),
        Ok(TwError {
            message: Some(message),
            ..
        }) => format!("twilio send failed ({status}): {message}"),
        _ => format!("twilio send failed ({status}): {body}"),
    }
}

#[async_trait]
impl Channel for TwilioChannel {
    fn name(&self) -> &str {
        "twilio"
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), IgsmsError> {
        let to = message
            .reply_target
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| IgsmsError::Sms("no reply_target on outgoing message".into()))?;

        self.send_text(to, &message.text).await
    }
}
