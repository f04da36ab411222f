//! Error types reported by engine adapters

use thiserror::Error;

/// Failure reported by an engine adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Operation exceeded its deadline
    #[error("timed out: {0}")]
    Timeout(String),

    /// Selector did not resolve to an element
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// Page navigation failed
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// The engine does not implement this action
    #[error("unsupported by engine: {0}")]
    Unsupported(String),

    /// Native session missing or unusable
    #[error("session error: {0}")]
    Session(String),

    /// Script evaluation failed inside the page
    #[error("script error: {0}")]
    Script(String),

    /// Transport-level I/O failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Connection to the backend was lost
    #[error("engine disconnected: {0}")]
    Disconnected(String),

    /// Backend process died
    #[error("engine crashed: {0}")]
    Crashed(String),

    /// Engine failed to start
    #[error("initialization failed: {0}")]
    Initialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Errors after which the engine must not be used until re-initialized.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, EngineError::Disconnected(_) | EngineError::Crashed(_))
    }

    /// Errors worth another attempt against the same action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Timeout(_)
                | EngineError::ElementNotFound(_)
                | EngineError::Navigation(_)
                | EngineError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_lost_backends_are_unrecoverable() {
        assert!(EngineError::Crashed("boom".into()).is_unrecoverable());
        assert!(EngineError::Disconnected("ws closed".into()).is_unrecoverable());
        assert!(!EngineError::Timeout("5s".into()).is_unrecoverable());
        assert!(!EngineError::Unsupported("hover".into()).is_unrecoverable());
    }

    #[test]
    fn unsupported_is_not_retryable() {
        assert!(EngineError::Timeout("5s".into()).is_retryable());
        assert!(!EngineError::Unsupported("hover".into()).is_retryable());
        assert!(!EngineError::Crashed("boom".into()).is_retryable());
    }
}
