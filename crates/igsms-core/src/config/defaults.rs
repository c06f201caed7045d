//! Default value functions used by serde for config deserialization.

pub fn default_data_dir() -> String {
    "/data".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_true() -> bool {
    true
}

pub fn default_poll_seconds() -> u64 {
    90
}

pub fn default_user_data_dir_name() -> String {
    "user_data_dir".to_string()
}

pub fn default_login_wait_attempts() -> u32 {
    120
}

pub fn default_login_wait_secs() -> u64 {
    5
}

pub fn default_debug_port() -> u16 {
    9222
}

pub fn default_viewport_width() -> u32 {
    800
}

pub fn default_viewport_height() -> u32 {
    600
}

pub fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
        .to_string()
}

pub fn default_twilio_api_base() -> String {
    "https://api.twilio.com".to_string()
}

pub fn default_db_name() -> String {
    "state.db".to_string()
}

pub fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_api_port() -> u16 {
    8000
}
