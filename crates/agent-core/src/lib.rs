//! Planning layer of WebPilot.
//!
//! Turns a natural-language goal plus an observed page context into an
//! ordered [`Plan`] of [`Action`]s, either from the reasoning collaborator's
//! structured output or from a minimal heuristic when that output is missing
//! or unusable.

pub mod analysis;
pub mod errors;
pub mod llm_provider;
pub mod model;
pub mod plan;
pub mod plan_validator;
pub mod planner;

pub use analysis::{ElementCounts, MarkupAnalyzer};
pub use errors::AgentError;
pub use llm_provider::{ReasoningOutput, ReasoningProvider, StaticReasoningProvider};
pub use model::{ContextSummary, PlanContext};
pub use plan::{Action, Plan, PlanSource};
pub use plan_validator::{PlanValidationIssue, PlannedStep, StepDefaults, ValidatedSteps};
pub use planner::{Planner, PlannerConfig};
