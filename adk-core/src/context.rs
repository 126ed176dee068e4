use crate::types::Content;
use tokio_util::sync::CancellationToken;

/// Everything an agent can see about the invocation it is serving.
pub trait InvocationContext: Send + Sync {
    fn invocation_id(&self) -> &str;
    fn agent_name(&self) -> &str;
    fn user_id(&self) -> &str;
    fn app_name(&self) -> &str;
    fn session_id(&self) -> &str;
    fn user_content(&self) -> &Content;
    fn run_config(&self) -> &RunConfig;

    /// Fires when the invocation is cancelled. Agents end their stream promptly
    /// once it does, surfacing [`AdkError::Cancelled`](crate::AdkError::Cancelled).
    fn cancellation_token(&self) -> &CancellationToken;

    fn is_cancelled(&self) -> bool {
        self.cancellation_token().is_cancelled()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamingMode {
    None,
    SSE,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub streaming_mode: StreamingMode,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { streaming_mode: StreamingMode::SSE }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_config_default() {
        let config = RunConfig::default();
        assert_eq!(config.streaming_mode, StreamingMode::SSE);
    }

    #[test]
    fn test_streaming_mode() {
        assert_eq!(StreamingMode::None, StreamingMode::None);
        assert_ne!(StreamingMode::None, StreamingMode::SSE);
    }
}
