use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use webpilot_core_types::EngineKind;

use crate::errors::EngineError;
use crate::types::{ActionKind, AdapterResult, SessionHandle, SessionOptions};

/// Contract every automation backend satisfies.
///
/// Adapters own their native browser/session objects; callers only ever see
/// [`SessionHandle`]s.
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    /// Concrete engine this adapter implements.
    fn kind(&self) -> EngineKind;

    /// Prepare the backend (launch browser, connect to endpoint, ...).
    async fn initialize(&self) -> Result<(), EngineError>;

    async fn create_session(&self, options: &SessionOptions)
        -> Result<SessionHandle, EngineError>;

    async fn close_session(&self, session: &SessionHandle) -> Result<(), EngineError>;

    async fn navigate(&self, session: &SessionHandle, url: &str) -> AdapterResult;

    async fn click(&self, session: &SessionHandle, selector: &str) -> AdapterResult;

    async fn type_text(&self, session: &SessionHandle, selector: &str, value: &str)
        -> AdapterResult;

    async fn scroll(&self, session: &SessionHandle, selector: Option<&str>) -> AdapterResult;

    /// Idle wait; adapters with smarter quiescence detection may override.
    async fn wait(&self, _session: &SessionHandle, duration: Duration) -> AdapterResult {
        tokio::time::sleep(duration).await;
        Ok(json!({ "waited_ms": duration.as_millis() as u64 }))
    }

    async fn screenshot(&self, session: &SessionHandle, full_page: bool) -> AdapterResult;

    async fn execute_script(&self, session: &SessionHandle, code: &str) -> AdapterResult;

    async fn get_markup(&self, session: &SessionHandle) -> AdapterResult;

    async fn get_text(&self, session: &SessionHandle, selector: &str) -> AdapterResult;

    async fn hover(&self, session: &SessionHandle, selector: &str) -> AdapterResult;

    async fn select_option(
        &self,
        session: &SessionHandle,
        selector: &str,
        value: &str,
    ) -> AdapterResult;

    async fn drag_and_drop(&self, session: &SessionHandle, source: &str, target: &str)
        -> AdapterResult;

    /// Release backend resources once every session is closed.
    async fn shutdown(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Route one action to the matching adapter method.
pub async fn perform(
    adapter: &dyn EngineAdapter,
    session: &SessionHandle,
    action: &ActionKind,
) -> AdapterResult {
    match action {
        ActionKind::Navigate { url } => adapter.navigate(session, url).await,
        ActionKind::Click { selector } => adapter.click(session, selector).await,
        ActionKind::TypeText { selector, text } => {
            adapter.type_text(session, selector, text).await
        }
        ActionKind::Scroll { selector } => adapter.scroll(session, selector.as_deref()).await,
        ActionKind::Wait { duration_ms } => {
            adapter
                .wait(session, Duration::from_millis(*duration_ms))
                .await
        }
        ActionKind::Screenshot { full_page } => adapter.screenshot(session, *full_page).await,
        ActionKind::ExecuteScript { script } => adapter.execute_script(session, script).await,
        ActionKind::GetMarkup => adapter.get_markup(session).await,
        ActionKind::GetText { selector } => adapter.get_text(session, selector).await,
        ActionKind::Hover { selector } => adapter.hover(session, selector).await,
        ActionKind::SelectOption { selector, value } => {
            adapter.select_option(session, selector, value).await
        }
        ActionKind::DragAndDrop { source, target } => {
            adapter.drag_and_drop(session, source, target).await
        }
    }
}
