//! Core data types shared by adapters and their callers

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::EngineError;

/// Result of a single adapter call: structured data on success.
pub type AdapterResult = Result<serde_json::Value, EngineError>;

/// Opaque handle to an adapter-native browsing session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle(pub String);

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Browser viewport dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

/// Options used when an adapter opens a native session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    pub headless: bool,
    pub stealth: bool,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub viewport: Option<Viewport>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            headless: true,
            stealth: false,
            user_agent: None,
            viewport: None,
        }
    }
}

/// One concrete browser operation together with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    Navigate { url: String },
    Click { selector: String },
    TypeText { selector: String, text: String },
    Scroll {
        #[serde(default)]
        selector: Option<String>,
    },
    Wait { duration_ms: u64 },
    Screenshot {
        #[serde(default)]
        full_page: bool,
    },
    ExecuteScript { script: String },
    GetMarkup,
    GetText { selector: String },
    Hover { selector: String },
    SelectOption { selector: String, value: String },
    DragAndDrop { source: String, target: String },
}

impl ActionKind {
    /// Stable snake_case name, identical to the serde tag.
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Navigate { .. } => "navigate",
            ActionKind::Click { .. } => "click",
            ActionKind::TypeText { .. } => "type_text",
            ActionKind::Scroll { .. } => "scroll",
            ActionKind::Wait { .. } => "wait",
            ActionKind::Screenshot { .. } => "screenshot",
            ActionKind::ExecuteScript { .. } => "execute_script",
            ActionKind::GetMarkup => "get_markup",
            ActionKind::GetText { .. } => "get_text",
            ActionKind::Hover { .. } => "hover",
            ActionKind::SelectOption { .. } => "select_option",
            ActionKind::DragAndDrop { .. } => "drag_and_drop",
        }
    }

    /// Rough wall-clock estimate used for plan time budgeting.
    pub fn estimated_ms(&self) -> u64 {
        match self {
            ActionKind::Navigate { .. } => 3_000,
            ActionKind::Wait { duration_ms } => *duration_ms,
            _ => 1_000,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Navigate { url } => write!(f, "navigate {url}"),
            ActionKind::Click { selector } => write!(f, "click {selector}"),
            ActionKind::TypeText { selector, .. } => write!(f, "type into {selector}"),
            ActionKind::Scroll { selector } => match selector {
                Some(selector) => write!(f, "scroll {selector}"),
                None => f.write_str("scroll page"),
            },
            ActionKind::Wait { duration_ms } => write!(f, "wait {duration_ms}ms"),
            ActionKind::Screenshot { full_page } => {
                if *full_page {
                    f.write_str("full-page screenshot")
                } else {
                    f.write_str("screenshot")
                }
            }
            ActionKind::ExecuteScript { .. } => f.write_str("execute script"),
            ActionKind::GetMarkup => f.write_str("read markup"),
            ActionKind::GetText { selector } => write!(f, "read text of {selector}"),
            ActionKind::Hover { selector } => write!(f, "hover {selector}"),
            ActionKind::SelectOption { selector, value } => {
                write!(f, "select '{value}' in {selector}")
            }
            ActionKind::DragAndDrop { source, target } => write!(f, "drag {source} to {target}"),
        }
    }
}
