mod defaults;
mod integrations;


pub use integrations::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::IgsmsError;
use defaults::*;

/// Top-level igsms configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub igsms: GeneralConfig,
    #[serde(default)]
    pub owner: OwnerConfig,
    #[serde(default)]
    pub instagram: InstagramConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub twilio: TwilioConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Root of all persistent data (state db, browser profile, logs).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// The one person allowed to control the monitor and receive notifications.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OwnerConfig {
    #[serde(default)]
    pub phone: String,
}

/// The watched direct-message thread and polling cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    #[serde(default)]
    pub thread_url: String,
    /// Base polling interval. Values below 10 are raised to 10.
    #[serde(default = "default_poll_seconds")]
    pub poll_seconds: u64,
    /// Browser profile directory name under `data_dir`.
    #[serde(default = "default_user_data_dir_name")]
    pub user_data_dir_name: String,
    /// How many times to re-check for a manual login before giving up.
    #[serde(default = "default_login_wait_attempts")]
    pub login_wait_attempts: u32,
    #[serde(default = "default_login_wait_secs")]
    pub login_wait_secs: u64,
    /// Restart the monitor at boot if it was running when the process stopped.
    #[serde(default = "default_true")]
    pub resume_on_start: bool,
}

impl Default for InstagramConfig {
    fn default() -> Self {
        Self {
            thread_url: String::new(),
            poll_seconds: default_poll_seconds(),
            user_data_dir_name: default_user_data_dir_name(),
            login_wait_attempts: default_login_wait_attempts(),
            login_wait_secs: default_login_wait_secs(),
            resume_on_start: true,
        }
    }
}

/// State store config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// SQLite file name under `data_dir`.
    #[serde(default = "default_db_name")]
    pub db_name: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_name: default_db_name(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Bearer token for the admin endpoints. Empty = admin endpoints disabled.
    #[serde(default)]
    pub secret_token: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            secret_token: String::new(),
        }
    }
}

impl Config {
    /// Overlay environment variables on top of file values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary lookup (env in production, a map in tests).
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, key: &str| {
            if let Some(v) = lookup(key).filter(|v| !v.is_empty()) {
                *target = v;
            }
        };

        set(&mut self.igsms.data_dir, "DATA_DIR");
        set(&mut self.owner.phone, "OWNER_PHONE");
        set(&mut self.instagram.thread_url, "IG_THREAD_URL");
        set(
            &mut self.instagram.user_data_dir_name,
            "USER_DATA_DIR_NAME",
        );
        set(&mut self.twilio.account_sid, "TWILIO_ACCOUNT_SID");
        set(&mut self.twilio.auth_token, "TWILIO_AUTH_TOKEN");
        set(&mut self.twilio.from_number, "TWILIO_FROM_NUMBER");
        set(&mut self.twilio.public_url, "PUBLIC_URL");
        set(&mut self.memory.db_name, "STATE_DB_NAME");
        set(&mut self.api.secret_token, "APP_SECRET_TOKEN");

        if let Some(v) = lookup("POLL_SECONDS") {
            match v.trim().parse::<u64>() {
                Ok(secs) => self.instagram.poll_seconds = secs,
                Err(e) => warn!("ignoring POLL_SECONDS={v:?}: {e}"),
            }
        }
        if let Some(v) = lookup("PORT") {
            match v.trim().parse::<u16>() {
                Ok(port) => self.api.port = port,
                Err(e) => warn!("ignoring PORT={v:?}: {e}"),
            }
        }
        if let Some(v) = lookup("HEADLESS_BROWSER") {
            self.browser.headless = !v.trim().eq_ignore_ascii_case("false");
        }
        if let Some(v) = lookup("VALIDATE_TWILIO_SIGNATURE") {
            self.twilio.validate_signature = !v.trim().eq_ignore_ascii_case("false");
        }
    }

    /// Check the fields the long-running service cannot work without.
    pub fn validate_for_service(&self) -> Result<(), IgsmsError> {
        let mut missing = Vec::new();
        if self.owner.phone.trim().is_empty() {
            missing.push("owner.phone (OWNER_PHONE)");
        }
        if self.instagram.thread_url.trim().is_empty() {
            missing.push("instagram.thread_url (IG_THREAD_URL)");
        }
        if self.twilio.account_sid.is_empty() {
            missing.push("twilio.account_sid (TWILIO_ACCOUNT_SID)");
        }
        if self.twilio.auth_token.is_empty() {
            missing.push("twilio.auth_token (TWILIO_AUTH_TOKEN)");
        }
        if self.twilio.from_number.is_empty() {
            missing.push("twilio.from_number (TWILIO_FROM_NUMBER)");
        }
        if !missing.is_empty() {
            return Err(IgsmsError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        let url = self.instagram.thread_url.trim();
        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(IgsmsError::Config(format!(
                "instagram.thread_url must be an http(s) URL, got {url:?}"
            )));
        }
        Ok(())
    }

    /// Expanded data directory.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand(&self.igsms.data_dir))
    }

    /// SQLite state database path.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join(&self.memory.db_name)
    }

    /// Persistent browser profile directory.
    pub fn user_data_dir(&self) -> PathBuf {
        self.data_dir().join(&self.instagram.user_data_dir_name)
    }

    /// Directory for rolling log files.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file, then apply environment overrides.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, IgsmsError> {
    let mut config = load_file(Path::new(path))?;
    config.apply_env_overrides();
    Ok(config)
}

fn load_file(path: &Path) -> Result<Config, IgsmsError> {
    if !path.exists() {
        info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| IgsmsError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    toml::from_str(&content)
        .map_err(|e| IgsmsError::Config(format!("failed to parse config: {}", e)))
}
