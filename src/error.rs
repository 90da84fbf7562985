/* src/error.rs */

use thiserror::Error;

/// Every failure the monitor can run into, from startup to delivery.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The account list or endpoint config is unusable. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// A single request failed (transport error or non-2xx status).
    #[error("network error: {0}")]
    Network(String),

    /// Every attempt of a request failed.
    #[error("request failed after {attempts} attempts: {source}")]
    RequestExhausted {
        attempts: u32,
        #[source]
        source: Box<MonitorError>,
    },

    #[error("unsupported proxy scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("invalid proxy '{line}': {reason}")]
    InvalidProxy { line: String, reason: String },

    /// The response body did not have the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("notification failed: {0}")]
    Notification(String),
}

impl From<reqwest::Error> for MonitorError {
    fn from(e: reqwest::Error) -> Self {
        MonitorError::Network(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
