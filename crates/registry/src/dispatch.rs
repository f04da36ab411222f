use std::sync::Arc;
use std::time::{Duration, Instant};

use action_primitives::{perform, ActionKind, EngineError};
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, warn};
use webpilot_core_types::{EngineKind, SessionId};

use crate::{errors::RegistryError, metrics, sessions::SessionManager, state::EngineRegistry};

/// Result of routing one action to an engine.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// Engine that produced `output`; `None` when no engine could be selected.
    pub engine: Option<EngineKind>,
    pub output: Result<Value, RegistryError>,
    /// Whether the automatic single-level engine fallback was used.
    pub fell_back: bool,
    pub elapsed: Duration,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        self.output.is_ok()
    }
}

/// Selects an engine per action and runs it against the caller's session.
///
/// An adapter failure on an explicitly preferred engine is retried exactly
/// once on the automatically selected engine, excluding the one that failed.
/// Anything beyond that is the executor's retry budget.
pub struct Dispatcher {
    registry: Arc<EngineRegistry>,
    sessions: Arc<SessionManager>,
}

impl Dispatcher {
    pub fn new(registry: Arc<EngineRegistry>, sessions: Arc<SessionManager>) -> Self {
        Self { registry, sessions }
    }

    pub fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub async fn dispatch(
        &self,
        action: &ActionKind,
        preference: EngineKind,
        deadline: Duration,
        session: &SessionId,
    ) -> DispatchOutcome {
        let started = Instant::now();
        let first = self
            .attempt(action, preference, None, deadline, session)
            .await;

        let (engine, output, fell_back) = match first {
            Ok((engine, value)) => (Some(engine), Ok(value), false),
            Err((failed, err)) if !preference.is_auto() && err.engine_error().is_some() => {
                warn!(
                    action = action.name(),
                    engine = ?failed,
                    error = %err,
                    "preferred engine failed; retrying on auto-selected engine"
                );
                metrics::record_fallback();
                match self
                    .attempt(action, EngineKind::Auto, failed, deadline, session)
                    .await
                {
                    Ok((engine, value)) => (Some(engine), Ok(value), true),
                    Err((_, RegistryError::NoEngineAvailable { .. })) => (failed, Err(err), true),
                    Err((engine, fallback_err)) => (engine, Err(fallback_err), true),
                }
            }
            Err((engine, err)) => (engine, Err(err), false),
        };

        DispatchOutcome {
            engine,
            output,
            fell_back,
            elapsed: started.elapsed(),
        }
    }

    async fn attempt(
        &self,
        action: &ActionKind,
        preference: EngineKind,
        exclude: Option<EngineKind>,
        deadline: Duration,
        session: &SessionId,
    ) -> Result<(EngineKind, Value), (Option<EngineKind>, RegistryError)> {
        let (engine, adapter) = self
            .registry
            .select_excluding(preference, exclude)
            .map_err(|err| (None, err))?;
        let handle = self
            .sessions
            .handle_for(session, engine)
            .await
            .map_err(|err| (Some(engine), err))?;

        debug!(action = action.name(), engine = %engine, session = %session, "dispatching");
        let result = match timeout(deadline, perform(adapter.as_ref(), &handle, action)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout(format!(
                "{} exceeded {}ms",
                action.name(),
                deadline.as_millis()
            ))),
        };
        metrics::record_dispatch(engine, result.is_ok());

        result.map(|value| (engine, value)).map_err(|err| {
            self.registry.report_failure(engine, &err);
            (Some(engine), RegistryError::engine(engine, err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_primitives::{ScriptedEngine, SessionOptions};

    async fn setup(
        engines: Vec<Arc<ScriptedEngine>>,
    ) -> (Dispatcher, SessionId) {
        let registry = Arc::new(EngineRegistry::new());
        for engine in engines {
            registry.register(engine).unwrap();
        }
        registry.initialize(None).await;
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&registry),
            SessionOptions::default(),
        ));
        let session = sessions.resolve(None).await.unwrap();
        (Dispatcher::new(registry, sessions), session)
    }

    fn click() -> ActionKind {
        ActionKind::Click {
            selector: "#submit".into(),
        }
    }

    #[tokio::test]
    async fn preferred_failure_falls_back_exactly_once() {
        let cdp = Arc::new(
            ScriptedEngine::new(EngineKind::Cdp)
                .fail_all(EngineError::ElementNotFound("#submit".into())),
        );
        let wd = Arc::new(ScriptedEngine::new(EngineKind::WebDriver));
        let (dispatcher, session) = setup(vec![cdp.clone(), wd.clone()]).await;

        let outcome = dispatcher
            .dispatch(&click(), EngineKind::Cdp, Duration::from_secs(1), &session)
            .await;

        assert!(outcome.is_success());
        assert!(outcome.fell_back);
        assert_eq!(outcome.engine, Some(EngineKind::WebDriver));
        assert_eq!(cdp.call_count("click"), 1);
        assert_eq!(wd.call_count("click"), 1);
    }

    #[tokio::test]
    async fn auto_preference_is_not_retried() {
        let cdp = Arc::new(
            ScriptedEngine::new(EngineKind::Cdp).fail_all(EngineError::Io("reset".into())),
        );
        let wd = Arc::new(ScriptedEngine::new(EngineKind::WebDriver));
        let (dispatcher, session) = setup(vec![cdp.clone(), wd.clone()]).await;

        let outcome = dispatcher
            .dispatch(&click(), EngineKind::Auto, Duration::from_secs(1), &session)
            .await;

        assert!(!outcome.is_success());
        assert!(!outcome.fell_back);
        assert_eq!(cdp.call_count("click"), 1);
        assert_eq!(wd.call_count("click"), 0);
    }

    #[tokio::test]
    async fn second_failure_is_reported_not_retried() {
        let cdp = Arc::new(
            ScriptedEngine::new(EngineKind::Cdp).fail_all(EngineError::Io("reset".into())),
        );
        let wd = Arc::new(
            ScriptedEngine::new(EngineKind::WebDriver)
                .fail_all(EngineError::ElementNotFound("#submit".into())),
        );
        let (dispatcher, session) = setup(vec![cdp.clone(), wd.clone()]).await;

        let outcome = dispatcher
            .dispatch(&click(), EngineKind::Cdp, Duration::from_secs(1), &session)
            .await;

        assert_eq!(outcome.engine, Some(EngineKind::WebDriver));
        assert!(matches!(
            outcome.output,
            Err(RegistryError::Engine {
                engine: EngineKind::WebDriver,
                ..
            })
        ));
        assert_eq!(cdp.call_count("click") + wd.call_count("click"), 2);
    }

    #[tokio::test]
    async fn lone_engine_failure_keeps_original_error() {
        let cdp = Arc::new(
            ScriptedEngine::new(EngineKind::Cdp).fail_all(EngineError::Io("reset".into())),
        );
        let (dispatcher, session) = setup(vec![cdp.clone()]).await;

        let outcome = dispatcher
            .dispatch(&click(), EngineKind::Cdp, Duration::from_secs(1), &session)
            .await;
        assert_eq!(outcome.engine, Some(EngineKind::Cdp));
        assert_eq!(
            outcome.output.unwrap_err().engine_error(),
            Some(&EngineError::Io("reset".into()))
        );
    }

    #[tokio::test]
    async fn timeout_becomes_adapter_failure() {
        let cdp = Arc::new(
            ScriptedEngine::new(EngineKind::Cdp).with_delay(Duration::from_millis(200)),
        );
        let (dispatcher, session) = setup(vec![cdp]).await;

        let outcome = dispatcher
            .dispatch(&click(), EngineKind::Auto, Duration::from_millis(20), &session)
            .await;
        assert!(matches!(
            outcome.output,
            Err(RegistryError::Engine {
                source: EngineError::Timeout(_),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn crash_marks_engine_unhealthy() {
        let cdp = Arc::new(
            ScriptedEngine::new(EngineKind::Cdp).fail_all(EngineError::Crashed("oom".into())),
        );
        let wd = Arc::new(ScriptedEngine::new(EngineKind::WebDriver));
        let (dispatcher, session) = setup(vec![cdp, wd]).await;

        let outcome = dispatcher
            .dispatch(&click(), EngineKind::Cdp, Duration::from_secs(1), &session)
            .await;
        assert_eq!(outcome.engine, Some(EngineKind::WebDriver));
        assert!(!dispatcher.registry().health(EngineKind::Cdp).is_healthy());

        let next = dispatcher
            .dispatch(&click(), EngineKind::Cdp, Duration::from_secs(1), &session)
            .await;
        assert!(!next.fell_back);
        assert_eq!(next.engine, Some(EngineKind::WebDriver));
    }
}
