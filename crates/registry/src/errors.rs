use action_primitives::EngineError;
use thiserror::Error;
use webpilot_core_types::EngineKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no engine available (preference: {preference})")]
    NoEngineAvailable { preference: EngineKind },
    #[error("engine {0} is not registered")]
    NotRegistered(EngineKind),
    #[error("'auto' is a selection policy, not an engine")]
    AutoNotRegistrable,
    #[error("session {0} not found")]
    SessionNotFound(String),
    #[error("{engine} failed: {source}")]
    Engine {
        engine: EngineKind,
        source: EngineError,
    },
}

impl RegistryError {
    pub fn engine(engine: EngineKind, source: EngineError) -> Self {
        Self::Engine { engine, source }
    }

    /// Adapter-level failure, as opposed to a routing problem.
    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            RegistryError::Engine { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.engine_error()
            .map(EngineError::is_retryable)
            .unwrap_or(false)
    }
}
