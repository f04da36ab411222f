//! Engine adapter contract for WebPilot.
//!
//! Every backend able to drive a rendered page implements [`EngineAdapter`]:
//! session lifecycle plus one method per [`ActionKind`]. Higher layers never
//! branch on the engine identity; they hand an action to [`perform`] and the
//! adapter's own implementation runs.
//!
//! Two engines ship with the crate:
//! - [`ScriptedEngine`]: deterministic, configurable outcomes (tests, dry runs)
//! - [`FetchEngine`]: plain HTTP fetch without rendering

mod adapter;
pub mod engines;
pub mod errors;
pub mod types;

pub use adapter::{perform, EngineAdapter};
pub use engines::{FetchEngine, ScriptedEngine};
pub use errors::EngineError;
pub use types::*;
