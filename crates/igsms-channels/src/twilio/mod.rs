//! Twilio Programmable Messaging channel.
//!
//! Outbound SMS goes through the REST `Messages` resource; inbound SMS arrives
//! as a form-encoded webhook signed with the account auth token.
//! Docs: <https://www.twilio.com/docs/messaging/api/message-resource>

mod inbound;
mod send;
mod signature;
pub(crate) mod types;

#[cfg(test)]
mod tests;

pub use inbound::parse_inbound;
pub use signature::{constant_time_eq, request_url, SignatureValidator};

use igsms_core::config::TwilioConfig;

/// Twilio refuses bodies longer than this many characters.
pub const MAX_SMS_CHARS: usize = 1600;

/// SMS channel backed by the Twilio REST API.
pub struct TwilioChannel {
    config: TwilioConfig,
    client: reqwest::Client,
    messages_url: String,
}

impl TwilioChannel {
    /// Create a new Twilio channel from config.
    pub fn new(config: TwilioConfig) -> Self {
        let messages_url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            config.api_base.trim_end_matches('/'),
            config.account_sid
        );
        Self {
            config,
            client: reqwest::Client::new(),
            messages_url,
        }
    }

    /// Validator for inbound webhook signatures, keyed by this account's token.
    pub fn validator(&self) -> SignatureValidator {
        SignatureValidator::new(&self.config.auth_token)
    }
}
