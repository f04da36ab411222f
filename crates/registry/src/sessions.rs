use std::collections::hash_map::Entry;
use std::sync::Arc;

use action_primitives::{SessionHandle, SessionOptions};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use webpilot_core_types::{EngineKind, SessionId};

use crate::{
    errors::RegistryError,
    metrics,
    model::{CleanupReport, LifeState, SessionCtx, SessionInfo},
    state::EngineRegistry,
};

/// Maps logical session ids to live adapter sessions.
///
/// Callers only ever hold a [`SessionId`]; native handles stay in here. Asking
/// for a session without an id yields the default session, created on first
/// use and reused afterwards.
pub struct SessionManager {
    registry: Arc<EngineRegistry>,
    options: SessionOptions,
    sessions: DashMap<SessionId, SessionCtx>,
    default_session: Mutex<Option<SessionId>>,
}

impl SessionManager {
    pub fn new(registry: Arc<EngineRegistry>, options: SessionOptions) -> Self {
        Self {
            registry,
            options,
            sessions: DashMap::new(),
            default_session: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    /// Open a session on the engine the registry selects for `preference`.
    pub async fn create(
        &self,
        preference: EngineKind,
        options: Option<SessionOptions>,
    ) -> Result<SessionId, RegistryError> {
        self.create_with_id(SessionId::new(), preference, options)
            .await
    }

    /// Open a session under a caller-chosen id.
    pub async fn create_with_id(
        &self,
        id: SessionId,
        preference: EngineKind,
        options: Option<SessionOptions>,
    ) -> Result<SessionId, RegistryError> {
        let (engine, adapter) = self.registry.select(preference)?;
        let options = options.unwrap_or_else(|| self.options.clone());
        let handle = adapter.create_session(&options).await.map_err(|err| {
            self.registry.report_failure(engine, &err);
            RegistryError::engine(engine, err)
        })?;

        info!(session = %id, engine = %engine, handle = %handle, "session created");
        if self
            .sessions
            .insert(id.clone(), SessionCtx::new(id.clone(), engine, handle))
            .is_some()
        {
            warn!(session = %id, "session id reused; previous native handles were not closed");
        }
        metrics::set_session_count(self.sessions.len());
        Ok(id)
    }

    /// Resolve a session id, creating sessions lazily.
    ///
    /// `None` maps to the default session. An id that is not known yet is
    /// opened on demand under that id.
    pub async fn resolve(&self, session: Option<&SessionId>) -> Result<SessionId, RegistryError> {
        match session {
            Some(id) if self.sessions.contains_key(id) => Ok(id.clone()),
            Some(id) => {
                debug!(session = %id, "opening session on first use");
                self.create_with_id(id.clone(), EngineKind::Auto, None).await
            }
            None => {
                let mut default = self.default_session.lock().await;
                if let Some(id) = default.as_ref() {
                    if self.sessions.contains_key(id) {
                        return Ok(id.clone());
                    }
                }
                let id = self.create(EngineKind::Auto, None).await?;
                debug!(session = %id, "default session created");
                *default = Some(id.clone());
                Ok(id)
            }
        }
    }

    /// Engine the session was opened on.
    pub fn engine_of(&self, session: &SessionId) -> Option<EngineKind> {
        self.sessions.get(session).map(|ctx| ctx.engine)
    }

    /// Native handle of `session` on `engine`, opening a secondary native
    /// session when the action was routed away from the primary engine.
    pub async fn handle_for(
        &self,
        session: &SessionId,
        engine: EngineKind,
    ) -> Result<SessionHandle, RegistryError> {
        {
            let mut ctx = self
                .sessions
                .get_mut(session)
                .ok_or_else(|| RegistryError::SessionNotFound(session.0.clone()))?;
            if let Some(handle) = ctx.handles.get(&engine) {
                let handle = handle.clone();
                ctx.state = LifeState::Active;
                return Ok(handle);
            }
        }

        let adapter = self.registry.adapter(engine)?;
        let handle = adapter
            .create_session(&self.options)
            .await
            .map_err(|err| {
                self.registry.report_failure(engine, &err);
                RegistryError::engine(engine, err)
            })?;
        debug!(session = %session, engine = %engine, handle = %handle, "secondary engine session opened");

        // `Some(existing)` when a concurrent caller attached a handle first.
        let attached = self.sessions.get_mut(session).map(|mut ctx| {
            ctx.state = LifeState::Active;
            let existing = match ctx.handles.entry(engine) {
                Entry::Occupied(existing) => Some(existing.get().clone()),
                Entry::Vacant(slot) => {
                    slot.insert(handle.clone());
                    None
                }
            };
            existing
        });
        let outcome = match attached {
            Some(None) => return Ok(handle),
            Some(Some(existing)) => Ok(existing),
            None => Err(RegistryError::SessionNotFound(session.0.clone())),
        };

        if let Err(err) = adapter.close_session(&handle).await {
            warn!(session = %session, engine = %engine, error = %err, "orphan session close failed");
        }
        outcome
    }

    /// Tear down every native handle of `session`, then forget it. Unknown
    /// ids are a no-op.
    ///
    /// Handles whose teardown failed stay registered so a later `close` can
    /// retry them.
    pub async fn close(&self, session: &SessionId) -> Result<(), RegistryError> {
        let handles: Vec<(EngineKind, SessionHandle)> = match self.sessions.get(session) {
            Some(ctx) => ctx
                .handles
                .iter()
                .map(|(engine, handle)| (*engine, handle.clone()))
                .collect(),
            None => {
                debug!(session = %session, "close of unknown session ignored");
                return Ok(());
            }
        };

        let mut first_error = None;
        let mut closed = Vec::with_capacity(handles.len());
        for (engine, handle) in handles {
            let result = match self.registry.adapter(engine) {
                Ok(adapter) => adapter
                    .close_session(&handle)
                    .await
                    .map_err(|err| RegistryError::engine(engine, err)),
                Err(err) => Err(err),
            };
            match result {
                Ok(()) => closed.push(engine),
                Err(err) => {
                    warn!(session = %session, engine = %engine, error = %err, "session close failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        if let Some(err) = first_error {
            if let Some(mut ctx) = self.sessions.get_mut(session) {
                for engine in &closed {
                    ctx.handles.remove(engine);
                }
            }
            return Err(err);
        }

        self.forget(session).await;
        info!(session = %session, "session closed");
        Ok(())
    }

    async fn forget(&self, session: &SessionId) {
        self.sessions.remove(session);
        metrics::set_session_count(self.sessions.len());
        let mut default = self.default_session.lock().await;
        if default.as_ref() == Some(session) {
            *default = None;
        }
    }

    /// Close every session, then release the adapters. Never fails; errors
    /// land in the report.
    pub async fn close_all(&self) -> CleanupReport {
        let ids: Vec<SessionId> = self.sessions.iter().map(|entry| entry.key().clone()).collect();
        let mut report = CleanupReport::default();
        for id in ids {
            if let Err(err) = self.close(&id).await {
                report.errors.push(format!("session {id}: {err}"));
                self.forget(&id).await;
            }
            report.closed += 1;
        }
        report.merge(self.registry.shutdown().await);
        if !report.is_clean() {
            warn!(errors = report.errors.len(), "cleanup finished with errors");
        }
        report
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions
            .iter()
            .map(|entry| SessionInfo::from(entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_primitives::{EngineError, ScriptedEngine};

    async fn manager_with(engines: Vec<Arc<ScriptedEngine>>) -> SessionManager {
        let registry = Arc::new(EngineRegistry::new());
        for engine in engines {
            registry.register(engine).unwrap();
        }
        registry.initialize(None).await;
        SessionManager::new(registry, SessionOptions::default())
    }

    #[tokio::test]
    async fn default_session_is_created_once() {
        let cdp = Arc::new(ScriptedEngine::new(EngineKind::Cdp));
        let manager = manager_with(vec![cdp.clone()]).await;

        let first = manager.resolve(None).await.unwrap();
        let second = manager.resolve(None).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cdp.open_sessions(), 1);
        assert_eq!(manager.engine_of(&first), Some(EngineKind::Cdp));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let cdp = Arc::new(ScriptedEngine::new(EngineKind::Cdp));
        let manager = manager_with(vec![cdp.clone()]).await;
        let id = manager.create(EngineKind::Cdp, None).await.unwrap();

        manager.close(&id).await.unwrap();
        manager.close(&id).await.unwrap();
        assert_eq!(cdp.closed_sessions(), 1);
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn failed_close_keeps_handle_for_retry() {
        let cdp = Arc::new(
            ScriptedEngine::new(EngineKind::Cdp)
                .fail_close_times(1, EngineError::Io("socket".into())),
        );
        let manager = manager_with(vec![cdp.clone()]).await;
        let id = manager.create(EngineKind::Cdp, None).await.unwrap();

        let err = manager.close(&id).await.unwrap_err();
        assert!(matches!(err, RegistryError::Engine { engine: EngineKind::Cdp, .. }));
        assert_eq!(manager.len(), 1);
        assert_eq!(cdp.open_sessions(), 1);

        manager.close(&id).await.unwrap();
        assert!(manager.is_empty());
        assert_eq!(cdp.open_sessions(), 0);
        assert_eq!(cdp.closed_sessions(), 2);
    }

    #[tokio::test]
    async fn concurrent_secondary_opens_share_one_handle() {
        let cdp = Arc::new(ScriptedEngine::new(EngineKind::Cdp));
        let wd = Arc::new(
            ScriptedEngine::new(EngineKind::WebDriver)
                .with_session_delay(std::time::Duration::from_millis(20)),
        );
        let manager = manager_with(vec![cdp, wd.clone()]).await;
        let id = manager.create(EngineKind::Cdp, None).await.unwrap();

        let (first, second) = tokio::join!(
            manager.handle_for(&id, EngineKind::WebDriver),
            manager.handle_for(&id, EngineKind::WebDriver)
        );
        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(wd.open_sessions(), 1);
        assert_eq!(wd.closed_sessions(), 1);
    }

    #[tokio::test]
    async fn caller_ids_open_on_first_use() {
        let manager = manager_with(vec![Arc::new(ScriptedEngine::new(EngineKind::WebDriver))]).await;
        let id = SessionId("checkout-flow".into());
        let resolved = manager.resolve(Some(&id)).await.unwrap();
        assert_eq!(resolved, id);
        assert_eq!(manager.engine_of(&id), Some(EngineKind::WebDriver));
    }

    #[tokio::test]
    async fn secondary_handles_close_with_session() {
        let cdp = Arc::new(ScriptedEngine::new(EngineKind::Cdp));
        let wd = Arc::new(ScriptedEngine::new(EngineKind::WebDriver));
        let manager = manager_with(vec![cdp.clone(), wd.clone()]).await;
        let id = manager.create(EngineKind::Cdp, None).await.unwrap();

        manager.handle_for(&id, EngineKind::WebDriver).await.unwrap();
        manager.handle_for(&id, EngineKind::WebDriver).await.unwrap();
        assert_eq!(wd.open_sessions(), 1);
        assert_eq!(manager.list()[0].engines.len(), 2);

        manager.close(&id).await.unwrap();
        assert_eq!(cdp.open_sessions(), 0);
        assert_eq!(wd.open_sessions(), 0);
    }

    #[tokio::test]
    async fn close_all_collects_errors_and_shuts_engines_down() {
        let cdp = Arc::new(
            ScriptedEngine::new(EngineKind::Cdp).fail_close(EngineError::Io("socket".into())),
        );
        let manager = manager_with(vec![cdp.clone()]).await;
        manager.create(EngineKind::Cdp, None).await.unwrap();
        manager.create(EngineKind::Cdp, None).await.unwrap();

        let report = manager.close_all().await;
        assert_eq!(report.closed, 2);
        assert_eq!(report.errors.len(), 2);
        assert!(cdp.was_shut_down());
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn no_healthy_engine_is_reported() {
        let manager = manager_with(vec![Arc::new(
            ScriptedEngine::new(EngineKind::Cdp)
                .fail_initialize(EngineError::Initialization("no chrome".into())),
        )])
        .await;
        let err = manager.resolve(None).await.unwrap_err();
        assert!(matches!(err, RegistryError::NoEngineAvailable { .. }));
    }
}
