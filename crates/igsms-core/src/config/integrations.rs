use super::defaults::*;
use serde::{Deserialize, Serialize};

/// Automated browser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run without a visible window. Set `false` locally to watch the session.
    #[serde(default = "default_true")]
    pub headless: bool,
    /// Chromium binary. Empty = search `PATH` for the usual names.
    #[serde(default)]
    pub executable: String,
    #[serde(default = "default_debug_port")]
    pub debug_port: u16,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: String::new(),
            debug_port: default_debug_port(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            user_agent: default_user_agent(),
        }
    }
}

/// Twilio SMS gateway config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwilioConfig {
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    /// Sender number in E.164 form.
    #[serde(default)]
    pub from_number: String,
    /// Reject inbound webhooks without a valid `X-Twilio-Signature`.
    #[serde(default = "default_true")]
    pub validate_signature: bool,
    /// Externally visible base URL (e.g. `https://igsms.example.com`).
    /// Empty = rebuild it from `Host` / `X-Forwarded-Proto`.
    #[serde(default)]
    pub public_url: String,
    #[serde(default = "default_twilio_api_base")]
    pub api_base: String,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            validate_signature: true,
            public_url: String::new(),
            api_base: default_twilio_api_base(),
        }
    }
}
