#[derive(Debug, thiserror::Error)]
pub enum AdkError {
    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Callback error: {0}")]
    Callback(String),

    /// The outbound channel to the peer is gone; nothing more can be reported.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl AdkError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AdkError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, AdkError>;
