use action_primitives::ActionKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use webpilot_core_types::{ActionId, EngineKind, PlanId};

use crate::model::PlanContext;

/// Per-action deadline applied when nothing more specific is known.
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 30_000;

/// Slack a `wait` action's deadline keeps beyond the wait itself.
pub const WAIT_TIMEOUT_HEADROOM_MS: u64 = 1_000;

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub description: String,
    pub operation: ActionKind,
    /// Engine preference; `auto` lets the dispatcher choose.
    #[serde(default)]
    pub engine: EngineKind,
    pub timeout_ms: u64,
    /// A failed critical action stops the remaining plan.
    #[serde(default)]
    pub critical: bool,
    /// Alternatives tried in order when this action fails.
    #[serde(default)]
    pub fallbacks: Vec<Action>,
    #[serde(default)]
    pub max_retries: u32,
}

impl Action {
    pub fn new(operation: ActionKind) -> Self {
        let timeout_ms = DEFAULT_ACTION_TIMEOUT_MS.max(min_timeout_ms(&operation));
        Self {
            id: ActionId::new(),
            description: operation.to_string(),
            operation,
            engine: EngineKind::Auto,
            timeout_ms,
            critical: false,
            fallbacks: Vec::new(),
            max_retries: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    pub fn on_engine(mut self, engine: EngineKind) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_fallback(mut self, fallback: Action) -> Self {
        self.fallbacks.push(fallback);
        self
    }

    /// Raises the deadline to at least [`min_timeout_ms`](Self::min_timeout_ms).
    pub fn with_timeout_at_least(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms.max(self.min_timeout_ms());
        self
    }

    /// Shortest deadline this action can complete within; zero when unbounded.
    pub fn min_timeout_ms(&self) -> u64 {
        min_timeout_ms(&self.operation)
    }

    pub fn estimated_ms(&self) -> u64 {
        self.operation.estimated_ms()
    }
}

fn min_timeout_ms(operation: &ActionKind) -> u64 {
    match operation {
        ActionKind::Wait { duration_ms } => duration_ms.saturating_add(WAIT_TIMEOUT_HEADROOM_MS),
        _ => 0,
    }
}

/// How a plan came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    /// Every step proposed by the reasoning collaborator validated.
    Reasoning,
    /// Some proposed steps were dropped during validation.
    PartiallyValidated,
    /// Built without reasoning output.
    Heuristic,
    /// Assembled by the caller or derived from another plan.
    Manual,
}

/// Ordered, immutable list of actions toward one goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub goal: String,
    pub steps: Vec<Action>,
    pub context: PlanContext,
    /// Planner's own estimate, in `[0, 1]`.
    pub confidence: f64,
    pub estimated_time_ms: u64,
    pub source: PlanSource,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl Plan {
    /// Builds a caller-assembled plan with full confidence.
    pub fn new(goal: impl Into<String>, steps: Vec<Action>, context: PlanContext) -> Self {
        Self::with_source(goal, steps, context, PlanSource::Manual, 1.0)
    }

    pub fn with_source(
        goal: impl Into<String>,
        steps: Vec<Action>,
        context: PlanContext,
        source: PlanSource,
        confidence: f64,
    ) -> Self {
        let estimated_time_ms = steps.iter().map(Action::estimated_ms).sum();
        Self {
            id: PlanId::new(),
            goal: goal.into(),
            steps,
            context,
            confidence: confidence.clamp(0.0, 1.0),
            estimated_time_ms,
            source,
            created_at: Utc::now(),
            notes: Vec::new(),
        }
    }

    /// New plan over a subset of this plan's steps, keeping goal and context.
    pub fn derive(&self, steps: Vec<Action>) -> Self {
        let mut plan = Self::with_source(
            self.goal.clone(),
            steps,
            self.context.clone(),
            PlanSource::Manual,
            self.confidence,
        );
        plan.notes.push(format!("derived from plan {}", self.id));
        plan
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, id: &ActionId) -> Option<&Action> {
        self.steps.iter().find(|step| &step.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_sums_step_costs() {
        let plan = Plan::new(
            "demo",
            vec![
                Action::new(ActionKind::Navigate {
                    url: "https://example.com".into(),
                }),
                Action::new(ActionKind::Wait { duration_ms: 1_500 }),
                Action::new(ActionKind::GetMarkup),
            ],
            PlanContext::default(),
        );
        assert_eq!(plan.estimated_time_ms, 3_000 + 1_500 + 1_000);
        assert_eq!(plan.source, PlanSource::Manual);
    }

    #[test]
    fn derived_plan_keeps_goal_with_fresh_id() {
        let original = Plan::new(
            "goal",
            vec![Action::new(ActionKind::GetMarkup)],
            PlanContext::default().with_url("https://example.com"),
        );
        let derived = original.derive(original.steps.clone());
        assert_ne!(derived.id, original.id);
        assert_eq!(derived.goal, "goal");
        assert_eq!(derived.context, original.context);
        assert_eq!(derived.steps[0].id, original.steps[0].id);
    }

    #[test]
    fn long_wait_gets_a_deadline_past_its_duration() {
        let wait = Action::new(ActionKind::Wait { duration_ms: 45_000 });
        assert_eq!(wait.timeout_ms, 45_000 + WAIT_TIMEOUT_HEADROOM_MS);

        let raised = Action::new(ActionKind::Wait { duration_ms: 300 }).with_timeout_at_least(100);
        assert_eq!(raised.timeout_ms, 300 + WAIT_TIMEOUT_HEADROOM_MS);

        let click = Action::new(ActionKind::Click {
            selector: "#go".into(),
        })
        .with_timeout_at_least(100);
        assert_eq!(click.timeout_ms, 100);
    }

    #[test]
    fn action_serializes_operation_with_tag() {
        let action = Action::new(ActionKind::Click {
            selector: "#go".into(),
        })
        .critical();
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["operation"]["kind"], "click");
        assert_eq!(value["engine"], "auto");
        assert_eq!(value["critical"], true);
    }
}
