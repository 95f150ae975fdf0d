use thiserror::Error;

/// Errors that can occur while tailing and parsing the access log
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Failed to parse log line: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur when delivering alerts
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Webhook returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to start HTTP runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
