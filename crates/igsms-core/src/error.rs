use thiserror::Error;

/// Top-level error type for igsms.
#[derive(Debug, Error)]
pub enum IgsmsError {
    /// Error from the SMS gateway.
    #[error("sms error: {0}")]
    Sms(String),

    /// Error from the automated browser session.
    #[error("browser error: {0}")]
    Browser(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// State store error.
    #[error("store error: {0}")]
    Store(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
