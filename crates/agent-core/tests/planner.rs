use std::sync::Arc;

use action_primitives::ActionKind;
use agent_core::{
    AgentError, ElementCounts, MarkupAnalyzer, PlanContext, PlanSource, Planner, PlannerConfig,
    StaticReasoningProvider,
};
use serde_json::json;
use webpilot_core_types::EngineKind;

struct CountingAnalyzer;

impl MarkupAnalyzer for CountingAnalyzer {
    fn analyze_markup(&self, markup: &str) -> Result<ElementCounts, AgentError> {
        let clickable = markup.matches("<button").count() + markup.matches("<a ").count();
        let form = markup.matches("<input").count();
        Ok(ElementCounts {
            total_elements: markup.matches('<').count() - markup.matches("</").count(),
            clickable_elements: clickable,
            form_elements: form,
            interactive_elements: clickable + form,
        })
    }
}

fn planner_with(provider: StaticReasoningProvider) -> (Planner, Arc<StaticReasoningProvider>) {
    let provider = Arc::new(provider);
    let planner = Planner::new(PlannerConfig::default()).with_reasoning(provider.clone());
    (planner, provider)
}

#[tokio::test]
async fn structured_steps_yield_reasoning_plan() {
    let (planner, provider) = planner_with(StaticReasoningProvider::steps(vec![
        json!({"kind": "navigate", "description": "Open shop", "parameters": {"url": "https://shop.test"}, "critical": true}),
        json!({"kind": "click", "parameters": {"selector": "#buy"}}),
    ]));

    let plan = planner
        .create_plan("buy a lamp", PlanContext::default(), None)
        .await;

    assert_eq!(provider.calls(), 1);
    assert_eq!(plan.source, PlanSource::Reasoning);
    assert_eq!(plan.confidence, 0.8);
    assert_eq!(plan.steps.len(), 2);
    assert!(plan.steps[0].critical);
    assert_eq!(plan.steps[0].description, "Open shop");
    assert_eq!(plan.estimated_time_ms, 3_000 + 1_000);
}

#[tokio::test]
async fn partially_valid_output_keeps_valid_steps_in_order() {
    let text = r#"Sure!
```json
[
  {"kind": "navigate", "parameters": {"url": "https://a.test"}},
  {"kind": "levitate"},
  {"kind": "get_text", "parameters": {"selector": "h1"}}
]
```"#;
    let (planner, _) = planner_with(StaticReasoningProvider::text(text));

    let plan = planner
        .create_plan("read the title", PlanContext::default(), None)
        .await;

    assert_eq!(plan.source, PlanSource::PartiallyValidated);
    assert_eq!(plan.confidence, 0.5);
    let kinds: Vec<_> = plan.steps.iter().map(|s| s.operation.name()).collect();
    assert_eq!(kinds, vec!["navigate", "get_text"]);
    assert_eq!(plan.notes.len(), 1);
}

#[tokio::test]
async fn unavailable_reasoning_falls_back_to_heuristic() {
    let (planner, _) = planner_with(StaticReasoningProvider::unavailable());
    let context = PlanContext::default().with_url("https://example.com");

    let plan = planner.create_plan("look around", context, None).await;

    assert_eq!(plan.source, PlanSource::Heuristic);
    assert_eq!(plan.confidence, 0.3);
    let kinds: Vec<_> = plan.steps.iter().map(|s| s.operation.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            ActionKind::Navigate {
                url: "https://example.com".into()
            },
            ActionKind::GetMarkup,
            ActionKind::Wait { duration_ms: 1_000 },
            ActionKind::Screenshot { full_page: true },
        ]
    );
    assert!(plan.steps[0].critical);
    assert_eq!(plan.steps[1].description, "Analyze page context");
}

#[tokio::test]
async fn garbage_output_with_markup_only_skips_navigation() {
    let (planner, _) = planner_with(StaticReasoningProvider::text("I cannot help with that."));
    let context = PlanContext::default().with_markup("<html><body>hi</body></html>");

    let plan = planner.create_plan("inspect", context, None).await;

    assert_eq!(plan.source, PlanSource::Heuristic);
    assert_eq!(plan.steps.len(), 3);
    assert_eq!(plan.steps[0].operation, ActionKind::GetMarkup);
}

#[tokio::test]
async fn empty_context_produces_empty_heuristic_plan() {
    let planner = Planner::new(PlannerConfig::default());
    let plan = planner
        .create_plan("no-op", PlanContext::default(), None)
        .await;
    assert!(plan.is_empty());
    assert!(plan.confidence <= 0.3);
    assert_eq!(plan.estimated_time_ms, 0);
}

#[tokio::test]
async fn plans_never_exceed_max_steps() {
    let steps: Vec<_> = (0..8)
        .map(|i| json!({"kind": "click", "parameters": {"selector": format!("#b{i}")}}))
        .collect();
    let (planner, _) = planner_with(StaticReasoningProvider::steps(steps));

    let plan = planner
        .create_plan("click everything", PlanContext::default(), Some(3))
        .await;
    assert_eq!(plan.steps.len(), 3);
    assert_eq!(
        plan.steps[2].operation,
        ActionKind::Click {
            selector: "#b2".into()
        }
    );

    let heuristic = Planner::new(PlannerConfig::default())
        .create_plan(
            "look",
            PlanContext::default().with_url("https://example.com"),
            Some(2),
        )
        .await;
    assert_eq!(heuristic.steps.len(), 2);
}

#[tokio::test]
async fn engine_preferences_flow_into_actions() {
    let (planner, _) = planner_with(StaticReasoningProvider::steps(vec![json!({
        "kind": "get_markup",
        "engine": "fetch",
        "max_retries": 1
    })]));
    let plan = planner
        .create_plan("read", PlanContext::default(), None)
        .await;
    assert_eq!(plan.steps[0].engine, EngineKind::Fetch);
    assert_eq!(plan.steps[0].max_retries, 1);
}

#[tokio::test]
async fn analyzer_counts_reach_summary_and_notes() {
    let planner = Planner::new(PlannerConfig::default()).with_analyzer(Arc::new(CountingAnalyzer));
    let context = PlanContext::default()
        .with_markup("<html><body><button>Go</button><input name=q></body></html>");

    let summary = planner.analyze_context(&context);
    let counts = summary.elements.expect("analyzer ran");
    assert_eq!(counts.clickable_elements, 1);
    assert_eq!(counts.form_elements, 1);

    let plan = planner.create_plan("search", context, None).await;
    assert!(plan.notes.iter().any(|note| note.contains("1 clickable")));
}
