//! HTTP fetch engine: loads documents without rendering them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::json;
use tracing::debug;
use url::Url;
use webpilot_core_types::EngineKind;

use crate::adapter::EngineAdapter;
use crate::errors::EngineError;
use crate::types::{AdapterResult, SessionHandle, SessionOptions};

const DEFAULT_USER_AGENT: &str = concat!("webpilot-fetch/", env!("CARGO_PKG_VERSION"));

static SCRIPT_OR_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)>").unwrap());
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Clone, Default)]
struct FetchPage {
    user_agent: Option<String>,
    url: Option<String>,
    status: Option<u16>,
    body: Option<String>,
}

/// Engine that issues plain GET requests.
///
/// Navigation and markup reads work; anything needing a live DOM
/// (clicks, typing, scripts, screenshots) reports [`EngineError::Unsupported`].
pub struct FetchEngine {
    timeout: Duration,
    client: RwLock<Option<reqwest::Client>>,
    pages: DashMap<String, FetchPage>,
    next_id: AtomicU64,
}

impl FetchEngine {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: RwLock::new(None),
            pages: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn client(&self) -> Result<reqwest::Client, EngineError> {
        self.client
            .read()
            .clone()
            .ok_or_else(|| EngineError::Initialization("fetch engine not initialized".into()))
    }

    fn page(&self, session: &SessionHandle) -> Result<FetchPage, EngineError> {
        self.pages
            .get(&session.0)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| EngineError::Session(format!("unknown fetch session {session}")))
    }

    fn loaded_body(&self, session: &SessionHandle) -> Result<String, EngineError> {
        self.page(session)?
            .body
            .ok_or_else(|| EngineError::Session("no document loaded yet".into()))
    }

    fn unsupported(action: &str) -> AdapterResult {
        Err(EngineError::Unsupported(format!(
            "{action} needs a rendering engine"
        )))
    }
}

impl Default for FetchEngine {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Visible text of an HTML document with scripts, styles and tags removed.
pub(crate) fn visible_text(markup: &str) -> String {
    let without_code = SCRIPT_OR_STYLE.replace_all(markup, " ");
    let without_tags = TAG.replace_all(&without_code, " ");
    WHITESPACE.replace_all(&without_tags, " ").trim().to_string()
}

#[async_trait]
impl EngineAdapter for FetchEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Fetch
    }

    async fn initialize(&self) -> Result<(), EngineError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|err| EngineError::Initialization(err.to_string()))?;
        *self.client.write() = Some(client);
        Ok(())
    }

    async fn create_session(
        &self,
        options: &SessionOptions,
    ) -> Result<SessionHandle, EngineError> {
        let id = format!("fetch-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.pages.insert(
            id.clone(),
            FetchPage {
                user_agent: options.user_agent.clone(),
                ..FetchPage::default()
            },
        );
        Ok(SessionHandle(id))
    }

    async fn close_session(&self, session: &SessionHandle) -> Result<(), EngineError> {
        self.pages.remove(&session.0);
        Ok(())
    }

    async fn navigate(&self, session: &SessionHandle, url: &str) -> AdapterResult {
        let parsed = Url::parse(url).map_err(|err| EngineError::Navigation(format!("{url}: {err}")))?;
        let page = self.page(session)?;
        let user_agent = page
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let response = self
            .client()?
            .get(parsed.clone())
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    EngineError::Timeout(format!("GET {parsed}"))
                } else {
                    EngineError::Io(err.to_string())
                }
            })?;

        let status = response.status();
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|err| EngineError::Io(err.to_string()))?;
        debug!(url = %final_url, status = status.as_u16(), bytes = body.len(), "fetched document");

        if !status.is_success() {
            return Err(EngineError::Navigation(format!(
                "GET {final_url} returned {status}"
            )));
        }

        let bytes = body.len();
        if let Some(mut entry) = self.pages.get_mut(&session.0) {
            entry.url = Some(final_url.clone());
            entry.status = Some(status.as_u16());
            entry.body = Some(body);
        }
        Ok(json!({ "url": final_url, "status": status.as_u16(), "bytes": bytes }))
    }

    async fn click(&self, _session: &SessionHandle, _selector: &str) -> AdapterResult {
        Self::unsupported("click")
    }

    async fn type_text(
        &self,
        _session: &SessionHandle,
        _selector: &str,
        _value: &str,
    ) -> AdapterResult {
        Self::unsupported("type_text")
    }

    async fn scroll(&self, _session: &SessionHandle, _selector: Option<&str>) -> AdapterResult {
        Self::unsupported("scroll")
    }

    async fn screenshot(&self, _session: &SessionHandle, _full_page: bool) -> AdapterResult {
        Self::unsupported("screenshot")
    }

    async fn execute_script(&self, _session: &SessionHandle, _code: &str) -> AdapterResult {
        Self::unsupported("execute_script")
    }

    async fn get_markup(&self, session: &SessionHandle) -> AdapterResult {
        let page = self.page(session)?;
        let body = self.loaded_body(session)?;
        Ok(json!({ "url": page.url, "status": page.status, "markup": body }))
    }

    async fn get_text(&self, session: &SessionHandle, selector: &str) -> AdapterResult {
        match selector.trim() {
            "body" | "html" | ":root" => {
                let body = self.loaded_body(session)?;
                Ok(json!({ "selector": selector, "text": visible_text(&body) }))
            }
            other => Err(EngineError::Unsupported(format!(
                "selector '{other}' needs a DOM; only document-level text is available"
            ))),
        }
    }

    async fn hover(&self, _session: &SessionHandle, _selector: &str) -> AdapterResult {
        Self::unsupported("hover")
    }

    async fn select_option(
        &self,
        _session: &SessionHandle,
        _selector: &str,
        _value: &str,
    ) -> AdapterResult {
        Self::unsupported("select_option")
    }

    async fn drag_and_drop(
        &self,
        _session: &SessionHandle,
        _source: &str,
        _target: &str,
    ) -> AdapterResult {
        Self::unsupported("drag_and_drop")
    }

    async fn shutdown(&self) -> Result<(), EngineError> {
        self.pages.clear();
        *self.client.write() = None;
        Ok(())
    }
}
