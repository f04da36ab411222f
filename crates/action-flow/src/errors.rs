//! Flow execution error types

use thiserror::Error;
use webpilot_registry::RegistryError;

/// Errors of the execution layer.
///
/// Action failures never appear here; they are recorded in
/// [`ActionResult`](crate::ActionResult)s.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FlowError {
    /// Explicit session management failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Verifier threshold outside `[0, 1]`
    #[error("success threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),
}
