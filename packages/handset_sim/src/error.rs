use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimError>;

/// Errors surfaced by the simulator driver.
///
/// `Validation` never reaches the transport layer; `RequestFailed` is any
/// non-success HTTP outcome; connection-level failures (refused, DNS,
/// timeout) pass through as `Transport`.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("request failed with HTTP {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl SimError {
    /// Synthesizes the generic message used when the server gives no usable
    /// error body.
    pub fn from_status(status: u16) -> Self {
        Self::RequestFailed {
            status,
            message: format!("HTTP {status}"),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
