use serde::{Deserialize, Serialize};

/// Liveness of one registered engine.
///
/// `Unknown` until the first `initialize`; a healthy engine only turns
/// `Unhealthy` after an unrecoverable failure and stays there until it is
/// initialized again.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineHealth {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl EngineHealth {
    pub fn is_healthy(self) -> bool {
        matches!(self, EngineHealth::Healthy)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngineHealth::Unknown => "unknown",
            EngineHealth::Healthy => "healthy",
            EngineHealth::Unhealthy => "unhealthy",
        }
    }
}
