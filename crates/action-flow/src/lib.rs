//! Execution layer of WebPilot.
//!
//! Runs a [`Plan`](agent_core::Plan) step by step through the registry's
//! dispatcher, observes every outcome, and estimates whether the goal was
//! reached. [`Orchestrator`] is the caller-facing entry point tying planning,
//! execution and verification together.

pub mod errors;
pub mod executor;
pub mod observer;
pub mod orchestrator;
pub mod strategies;
pub mod types;
pub mod verifier;

pub use errors::FlowError;
pub use executor::{Executor, ExecutorConfig};
pub use observer::Observer;
pub use orchestrator::Orchestrator;
pub use strategies::RetryPolicy;
pub use types::{ActionResult, ActionStatus, ExecutionResult, VerificationResult};
pub use verifier::{GoalVerifier, HeuristicVerifier, DEFAULT_SUCCESS_THRESHOLD};
