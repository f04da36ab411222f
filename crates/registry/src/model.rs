use std::collections::HashMap;
use std::time::Instant;

use action_primitives::SessionHandle;
use serde::Serialize;
use webpilot_core_types::{EngineKind, SessionId};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifeState {
    Ready,
    Active,
}

/// Logical session bound to a primary engine.
///
/// Secondary handles appear when the dispatcher routes one of the session's
/// actions to another engine.
#[derive(Clone, Debug)]
pub struct SessionCtx {
    pub id: SessionId,
    pub engine: EngineKind,
    pub handles: HashMap<EngineKind, SessionHandle>,
    pub created_at: Instant,
    pub state: LifeState,
}

impl SessionCtx {
    pub fn new(id: SessionId, engine: EngineKind, handle: SessionHandle) -> Self {
        let mut handles = HashMap::new();
        handles.insert(engine, handle);
        Self {
            id,
            engine,
            handles,
            created_at: Instant::now(),
            state: LifeState::Ready,
        }
    }
}

/// Read-only view of a session handed out to callers.
#[derive(Clone, Debug, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub engine: EngineKind,
    pub engines: Vec<EngineKind>,
    pub state: LifeState,
    pub age_ms: u64,
}

impl From<&SessionCtx> for SessionInfo {
    fn from(ctx: &SessionCtx) -> Self {
        let mut engines: Vec<EngineKind> = ctx.handles.keys().copied().collect();
        engines.sort();
        Self {
            id: ctx.id.clone(),
            engine: ctx.engine,
            engines,
            state: ctx.state,
            age_ms: ctx.created_at.elapsed().as_millis() as u64,
        }
    }
}

/// Outcome of a best-effort teardown.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CleanupReport {
    pub closed: usize,
    pub errors: Vec<String>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: CleanupReport) {
        self.closed += other.closed;
        self.errors.extend(other.errors);
    }
}
