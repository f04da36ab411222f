use action_primitives::ActionKind;

use crate::model::{ContextSummary, PlanContext};
use crate::plan::Action;
use crate::planner::PlannerConfig;

/// Minimal plan used when no usable reasoning output exists:
/// navigate (when a URL is known), analyze, settle, capture.
///
/// Empty when the context has neither a URL nor markup.
pub fn heuristic_steps(
    context: &PlanContext,
    summary: &ContextSummary,
    config: &PlannerConfig,
) -> Vec<Action> {
    if !summary.has_signal() {
        return Vec::new();
    }
    let timeout_ms = config.default_timeout_ms;
    let mut steps = Vec::with_capacity(4);

    if let Some(url) = context.url() {
        steps.push(
            Action::new(ActionKind::Navigate {
                url: url.to_string(),
            })
            .with_description(format!("Navigate to {url}"))
            .with_timeout_ms(timeout_ms)
            .critical(),
        );
    }
    steps.push(
        Action::new(ActionKind::GetMarkup)
            .with_description("Analyze page context")
            .with_timeout_ms(timeout_ms),
    );
    steps.push(
        Action::new(ActionKind::Wait {
            duration_ms: config.settle_ms,
        })
        .with_description("Wait for the page to settle")
        .with_timeout_at_least(timeout_ms),
    );
    steps.push(
        Action::new(ActionKind::Screenshot { full_page: true })
            .with_description("Capture the final state")
            .with_timeout_ms(timeout_ms),
    );
    steps
}
