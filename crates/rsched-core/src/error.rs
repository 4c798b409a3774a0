use thiserror::Error;

#[derive(Debug, Error)]
pub enum RschedError {
    /// Bad instance URL, bad token, failed liveness probe or listener bind.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success envelope.
    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// The response body does not follow the envelope contract.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RschedError {
    /// Short error code string, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            RschedError::Config(_) => "CONFIG_ERROR",
            RschedError::Transport(_) => "TRANSPORT_ERROR",
            RschedError::Remote { .. } => "REMOTE_ERROR",
            RschedError::Protocol(_) => "PROTOCOL_ERROR",
            RschedError::Serialization(_) => "SERIALIZATION_ERROR",
            RschedError::Io(_) => "IO_ERROR",
        }
    }

    /// Whether repeating the same call could plausibly succeed.
    /// Nothing in this workspace retries on its own; callers decide.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RschedError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, RschedError>;
