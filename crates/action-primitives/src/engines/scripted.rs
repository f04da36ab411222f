//! Deterministic engine with configurable outcomes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{json, Value};
use webpilot_core_types::EngineKind;

use crate::adapter::EngineAdapter;
use crate::errors::EngineError;
use crate::types::{AdapterResult, SessionHandle, SessionOptions};

const ANY_ACTION: &str = "*";

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn next_handle(kind: EngineKind) -> String {
    format!("{}-{}", kind.as_str(), NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone)]
struct ScriptedFailure {
    /// `None` fails forever.
    remaining: Option<u32>,
    error: EngineError,
}

/// Engine whose every outcome is decided up front.
///
/// Used by tests and by `--dry-run` to exercise planning and dispatch without a
/// browser. Actions succeed unless a failure was scripted for their name
/// (`"click"`, `"navigate"`, ...) or for every action.
pub struct ScriptedEngine {
    kind: EngineKind,
    init_failure: Option<EngineError>,
    close_failure: Mutex<Option<ScriptedFailure>>,
    failures: Mutex<HashMap<String, ScriptedFailure>>,
    delay: Option<Duration>,
    session_delay: Option<Duration>,
    markup: String,
    sessions: DashMap<String, SessionOptions>,
    calls: Mutex<Vec<String>>,
    closed: AtomicUsize,
    shut_down: AtomicBool,
}

impl ScriptedEngine {
    pub fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            init_failure: None,
            close_failure: Mutex::new(None),
            failures: Mutex::new(HashMap::new()),
            delay: None,
            session_delay: None,
            markup: "<html><body></body></html>".to_string(),
            sessions: DashMap::new(),
            calls: Mutex::new(Vec::new()),
            closed: AtomicUsize::new(0),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn fail_initialize(mut self, error: EngineError) -> Self {
        self.init_failure = Some(error);
        self
    }

    /// Fail every session close; the native session stays open.
    pub fn fail_close(self, error: EngineError) -> Self {
        *self.close_failure.lock() = Some(ScriptedFailure {
            remaining: None,
            error,
        });
        self
    }

    /// Fail the first `times` session closes, then succeed.
    pub fn fail_close_times(self, times: u32, error: EngineError) -> Self {
        *self.close_failure.lock() = Some(ScriptedFailure {
            remaining: Some(times),
            error,
        });
        self
    }

    /// Fail every call of `action` with `error`.
    pub fn fail_action(self, action: &str, error: EngineError) -> Self {
        self.failures.lock().insert(
            action.to_string(),
            ScriptedFailure {
                remaining: None,
                error,
            },
        );
        self
    }

    /// Fail the first `times` calls of `action`, then succeed.
    pub fn fail_action_times(self, action: &str, times: u32, error: EngineError) -> Self {
        self.failures.lock().insert(
            action.to_string(),
            ScriptedFailure {
                remaining: Some(times),
                error,
            },
        );
        self
    }

    pub fn fail_all(self, error: EngineError) -> Self {
        self.fail_action(ANY_ACTION, error)
    }

    /// Delay applied before every action call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Delay applied before a native session is opened.
    pub fn with_session_delay(mut self, delay: Duration) -> Self {
        self.session_delay = Some(delay);
        self
    }

    pub fn with_markup(mut self, markup: impl Into<String>) -> Self {
        self.markup = markup.into();
        self
    }

    /// Names of every action call received, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, action: &str) -> usize {
        self.calls.lock().iter().filter(|name| *name == action).count()
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn closed_sessions(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn was_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn take_failure(&self, action: &str) -> Option<EngineError> {
        let mut failures = self.failures.lock();
        for key in [action, ANY_ACTION] {
            let Some(entry) = failures.get_mut(key) else {
                continue;
            };
            match entry.remaining {
                None => return Some(entry.error.clone()),
                Some(0) => {}
                Some(left) => {
                    entry.remaining = Some(left - 1);
                    return Some(entry.error.clone());
                }
            }
            failures.remove(key);
        }
        None
    }

    async fn run(&self, session: &SessionHandle, action: &str, data: Value) -> AdapterResult {
        self.calls.lock().push(action.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if !self.sessions.contains_key(&session.0) {
            return Err(EngineError::Session(format!(
                "unknown session {session} on {}",
                self.kind
            )));
        }
        if let Some(error) = self.take_failure(action) {
            return Err(error);
        }
        let mut data = data;
        if let Some(obj) = data.as_object_mut() {
            obj.insert("engine".to_string(), json!(self.kind.as_str()));
        }
        Ok(data)
    }
}

#[async_trait]
impl EngineAdapter for ScriptedEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn initialize(&self) -> Result<(), EngineError> {
        match &self.init_failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn create_session(
        &self,
        options: &SessionOptions,
    ) -> Result<SessionHandle, EngineError> {
        if let Some(delay) = self.session_delay {
            tokio::time::sleep(delay).await;
        }
        let handle = SessionHandle(next_handle(self.kind));
        self.sessions.insert(handle.0.clone(), options.clone());
        Ok(handle)
    }

    async fn close_session(&self, session: &SessionHandle) -> Result<(), EngineError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        let scripted = match self.close_failure.lock().as_mut() {
            Some(ScriptedFailure {
                remaining: None,
                error,
            }) => Some(error.clone()),
            Some(ScriptedFailure {
                remaining: Some(left),
                error,
            }) if *left > 0 => {
                *left -= 1;
                Some(error.clone())
            }
            _ => None,
        };
        if let Some(error) = scripted {
            return Err(error);
        }
        self.sessions.remove(&session.0);
        Ok(())
    }

    async fn navigate(&self, session: &SessionHandle, url: &str) -> AdapterResult {
        self.run(session, "navigate", json!({ "url": url, "status": 200 }))
            .await
    }

    async fn click(&self, session: &SessionHandle, selector: &str) -> AdapterResult {
        self.run(session, "click", json!({ "selector": selector }))
            .await
    }

    async fn type_text(
        &self,
        session: &SessionHandle,
        selector: &str,
        value: &str,
    ) -> AdapterResult {
        self.run(
            session,
            "type_text",
            json!({ "selector": selector, "typed": value.chars().count() }),
        )
        .await
    }

    async fn scroll(&self, session: &SessionHandle, selector: Option<&str>) -> AdapterResult {
        self.run(session, "scroll", json!({ "selector": selector }))
            .await
    }

    async fn wait(&self, session: &SessionHandle, duration: Duration) -> AdapterResult {
        self.run(
            session,
            "wait",
            json!({ "waited_ms": duration.as_millis() as u64 }),
        )
        .await
    }

    async fn screenshot(&self, session: &SessionHandle, full_page: bool) -> AdapterResult {
        self.run(
            session,
            "screenshot",
            json!({ "full_page": full_page, "bytes": 0 }),
        )
        .await
    }

    async fn execute_script(&self, session: &SessionHandle, code: &str) -> AdapterResult {
        self.run(
            session,
            "execute_script",
            json!({ "script_len": code.len(), "result": Value::Null }),
        )
        .await
    }

    async fn get_markup(&self, session: &SessionHandle) -> AdapterResult {
        self.run(session, "get_markup", json!({ "markup": self.markup }))
            .await
    }

    async fn get_text(&self, session: &SessionHandle, selector: &str) -> AdapterResult {
        self.run(
            session,
            "get_text",
            json!({ "selector": selector, "text": "" }),
        )
        .await
    }

    async fn hover(&self, session: &SessionHandle, selector: &str) -> AdapterResult {
        self.run(session, "hover", json!({ "selector": selector }))
            .await
    }

    async fn select_option(
        &self,
        session: &SessionHandle,
        selector: &str,
        value: &str,
    ) -> AdapterResult {
        self.run(
            session,
            "select_option",
            json!({ "selector": selector, "value": value }),
        )
        .await
    }

    async fn drag_and_drop(
        &self,
        session: &SessionHandle,
        source: &str,
        target: &str,
    ) -> AdapterResult {
        self.run(
            session,
            "drag_and_drop",
            json!({ "source": source, "target": target }),
        )
        .await
    }

    async fn shutdown(&self) -> Result<(), EngineError> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::perform;
    use crate::types::ActionKind;

    #[tokio::test]
    async fn counted_failures_expire() {
        let engine = ScriptedEngine::new(EngineKind::Cdp).fail_action_times(
            "click",
            2,
            EngineError::ElementNotFound("#go".into()),
        );
        let session = engine
            .create_session(&SessionOptions::default())
            .await
            .unwrap();
        let click = ActionKind::Click {
            selector: "#go".into(),
        };

        assert!(perform(&engine, &session, &click).await.is_err());
        assert!(perform(&engine, &session, &click).await.is_err());
        let output = perform(&engine, &session, &click).await.unwrap();
        assert_eq!(output["engine"], "cdp");
        assert_eq!(engine.call_count("click"), 3);
    }

    #[tokio::test]
    async fn unknown_session_is_rejected() {
        let engine = ScriptedEngine::new(EngineKind::WebDriver);
        let err = perform(
            &engine,
            &SessionHandle("ghost".into()),
            &ActionKind::GetMarkup,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Session(_)));
    }

    #[tokio::test]
    async fn close_removes_session() {
        let engine = ScriptedEngine::new(EngineKind::Cdp);
        let session = engine
            .create_session(&SessionOptions::default())
            .await
            .unwrap();
        assert_eq!(engine.open_sessions(), 1);
        engine.close_session(&session).await.unwrap();
        assert_eq!(engine.open_sessions(), 0);
        assert_eq!(engine.closed_sessions(), 1);
    }
}
