mod heuristic;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::analysis::MarkupAnalyzer;
use crate::llm_provider::ReasoningProvider;
use crate::model::{ContextSummary, PlanContext};
use crate::plan::{Plan, PlanSource, DEFAULT_ACTION_TIMEOUT_MS};
use crate::plan_validator::{extract_steps, validate_steps, StepDefaults};

pub use heuristic::heuristic_steps;

/// Confidence of a plan whose every proposed step validated.
pub const REASONING_CONFIDENCE: f64 = 0.8;
/// Confidence of a plan that kept only part of the proposed steps.
pub const PARTIAL_CONFIDENCE: f64 = 0.5;
/// Confidence of the heuristic fallback plan.
pub const HEURISTIC_CONFIDENCE: f64 = 0.3;

/// Planner tuning knobs.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Upper bound on plan length when the caller gives none.
    pub max_steps: usize,
    pub default_timeout_ms: u64,
    pub default_max_retries: u32,
    /// Settle delay inserted by the heuristic plan.
    pub settle_ms: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            default_timeout_ms: DEFAULT_ACTION_TIMEOUT_MS,
            default_max_retries: 0,
            settle_ms: 1_000,
        }
    }
}

/// Turns a goal and a context snapshot into a [`Plan`].
#[derive(Clone, Default)]
pub struct Planner {
    config: PlannerConfig,
    reasoning: Option<Arc<dyn ReasoningProvider>>,
    analyzer: Option<Arc<dyn MarkupAnalyzer>>,
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            config,
            reasoning: None,
            analyzer: None,
        }
    }

    pub fn with_reasoning(mut self, provider: Arc<dyn ReasoningProvider>) -> Self {
        self.reasoning = Some(provider);
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn MarkupAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Summarises the context, consulting the markup analyzer when present.
    pub fn analyze_context(&self, context: &PlanContext) -> ContextSummary {
        let elements = match (&self.analyzer, context.markup.as_deref()) {
            (Some(analyzer), Some(markup)) if context.has_markup() => {
                match analyzer.analyze_markup(markup) {
                    Ok(counts) => Some(counts),
                    Err(err) => {
                        warn!(error = %err, "markup analysis failed");
                        None
                    }
                }
            }
            _ => None,
        };
        ContextSummary::from_context(context, elements)
    }

    /// Builds a plan; never fails and never exceeds `max_steps` actions.
    pub async fn create_plan(
        &self,
        goal: &str,
        context: PlanContext,
        max_steps: Option<usize>,
    ) -> Plan {
        let max_steps = max_steps.unwrap_or(self.config.max_steps).max(1);
        let summary = self.analyze_context(&context);
        let defaults = StepDefaults {
            timeout_ms: self.config.default_timeout_ms,
            max_retries: self.config.default_max_retries,
        };

        let mut notes = Vec::new();
        let proposed = match &self.reasoning {
            Some(provider) => match provider.propose_steps(goal, &summary, max_steps).await {
                Ok(output) => match extract_steps(&output) {
                    Ok(raw) => {
                        let validated = validate_steps(&raw, defaults);
                        for issue in &validated.issues {
                            debug!(%issue, "dropping proposed step");
                            notes.push(issue.to_string());
                        }
                        if validated.actions.is_empty() {
                            None
                        } else if validated.is_clean() {
                            Some((validated.actions, PlanSource::Reasoning, REASONING_CONFIDENCE))
                        } else {
                            Some((
                                validated.actions,
                                PlanSource::PartiallyValidated,
                                PARTIAL_CONFIDENCE,
                            ))
                        }
                    }
                    Err(issue) => {
                        warn!(%issue, "reasoning output unusable");
                        notes.push(issue.to_string());
                        None
                    }
                },
                Err(err) => {
                    warn!(error = %err, "reasoning call failed");
                    notes.push(err.to_string());
                    None
                }
            },
            None => None,
        };

        let (mut steps, source, confidence) = proposed.unwrap_or_else(|| {
            (
                heuristic_steps(&context, &summary, &self.config),
                PlanSource::Heuristic,
                HEURISTIC_CONFIDENCE,
            )
        });
        if steps.len() > max_steps {
            debug!(proposed = steps.len(), max_steps, "truncating plan");
            steps.truncate(max_steps);
        }

        if let Some(elements) = summary.elements {
            notes.push(format!(
                "context: {} elements, {} clickable, {} form, {} interactive",
                elements.total_elements,
                elements.clickable_elements,
                elements.form_elements,
                elements.interactive_elements
            ));
        }

        let mut plan = Plan::with_source(goal, steps, context, source, confidence);
        plan.notes = notes;
        info!(
            plan_id = %plan.id,
            steps = plan.steps.len(),
            source = ?plan.source,
            confidence = plan.confidence,
            "plan created"
        );
        plan
    }
}
