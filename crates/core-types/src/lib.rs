use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

/// Shared error type for the WebPilot crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown engine kind '{0}'")]
    UnknownEngine(String),
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PlanId(pub String);

impl PlanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ActionId(pub String);

impl ActionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend variant able to execute browser-style actions.
///
/// `Auto` never names a concrete adapter; it asks the dispatcher to pick the
/// first healthy engine in priority order.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum EngineKind {
    /// Chromium driven over the DevTools protocol.
    Cdp,
    /// Any W3C WebDriver endpoint.
    WebDriver,
    /// Plain HTTP fetch without rendering.
    Fetch,
    #[default]
    Auto,
}

impl EngineKind {
    /// Concrete engines in their default priority order.
    pub const CONCRETE: [EngineKind; 3] = [EngineKind::Cdp, EngineKind::WebDriver, EngineKind::Fetch];

    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Cdp => "cdp",
            EngineKind::WebDriver => "webdriver",
            EngineKind::Fetch => "fetch",
            EngineKind::Auto => "auto",
        }
    }

    pub fn is_auto(self) -> bool {
        matches!(self, EngineKind::Auto)
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let key = raw.trim().to_ascii_lowercase().replace(['-', '_'], "");
        match key.as_str() {
            "cdp" | "chromium" | "chrome" => Ok(EngineKind::Cdp),
            "webdriver" | "wd" => Ok(EngineKind::WebDriver),
            "fetch" | "http" => Ok(EngineKind::Fetch),
            "auto" | "" => Ok(EngineKind::Auto),
            _ => Err(CoreError::UnknownEngine(raw.to_string())),
        }
    }
}
