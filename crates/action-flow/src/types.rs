//! Execution results.

use agent_core::{Action, Plan};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use webpilot_core_types::{ActionId, EngineKind, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    Failed,
}

/// Outcome of one plan step, after retries and fallbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Plan step this result belongs to.
    pub step_id: ActionId,
    /// Action that produced the result; differs from `step_id` when a
    /// fallback action succeeded.
    pub action_id: ActionId,
    pub description: String,
    pub critical: bool,
    pub status: ActionStatus,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub execution_time_ms: u64,
    pub engine_used: Option<EngineKind>,
    pub observations: Vec<String>,
    /// Dispatch attempts spent on the surviving action.
    pub attempts: u32,
}

impl ActionResult {
    pub fn is_success(&self) -> bool {
        self.status == ActionStatus::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status == ActionStatus::Failed
    }

    pub fn used_fallback(&self) -> bool {
        self.step_id != self.action_id
    }

    /// Result for a step that never reached an engine.
    pub(crate) fn not_dispatched(action: &Action, error: String) -> Self {
        Self {
            step_id: action.id.clone(),
            action_id: action.id.clone(),
            description: action.description.clone(),
            critical: action.critical,
            status: ActionStatus::Failed,
            output: None,
            error: Some(error),
            execution_time_ms: 0,
            engine_used: None,
            observations: Vec::new(),
            attempts: 0,
        }
    }
}

/// Verifier output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub goal_achieved: bool,
    pub confidence: f64,
    pub reasoning: String,
    pub evidence: Vec<String>,
    pub suggestions: Vec<String>,
}

/// Terminal value of one plan execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub plan: Plan,
    pub goal_achieved: bool,
    pub steps_completed: usize,
    pub steps_total: usize,
    pub elapsed_ms: u64,
    pub results: Vec<ActionResult>,
    pub errors: Vec<String>,
    /// Session the plan ran in; `None` when no session could be opened.
    pub session_id: Option<SessionId>,
    pub verification: VerificationResult,
    pub started_at: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed_results(&self) -> impl Iterator<Item = &ActionResult> {
        self.results.iter().filter(|r| r.is_failed())
    }

    /// Plan steps whose surviving result failed, in plan order.
    pub fn failed_steps(&self) -> Vec<Action> {
        self.failed_results()
            .filter_map(|result| self.plan.step(&result.step_id).cloned())
            .collect()
    }

    /// Whether execution stopped early on a critical failure.
    pub fn aborted(&self) -> bool {
        self.steps_completed < self.steps_total
            && self
                .results
                .last()
                .map(|r| r.critical && r.is_failed())
                .unwrap_or(false)
    }
}
