use thiserror::Error;

/// Errors emitted by the agent-core crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// The reasoning collaborator could not be reached or declined to answer.
    #[error("reasoning unavailable: {0}")]
    ReasoningUnavailable(String),

    /// Raised when the collaborator's answer cannot be read as a plan.
    #[error("invalid plan output: {0}")]
    InvalidOutput(String),

    /// Markup analysis failed.
    #[error("context analysis failed: {0}")]
    Analysis(String),
}

impl AgentError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::ReasoningUnavailable(message.into())
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }
}
