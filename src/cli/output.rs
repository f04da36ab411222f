use std::fmt::Write as _;

use action_flow::{ActionStatus, ExecutionResult};
use agent_core::{Plan, PlanSource};
use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

/// Prints `value` in the requested format; `human` uses `render`.
pub fn emit<T, F>(format: &OutputFormat, value: &T, render: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human => print!("{}", render(value)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

fn source_label(source: PlanSource) -> &'static str {
    match source {
        PlanSource::Reasoning => "reasoning",
        PlanSource::PartiallyValidated => "partially validated",
        PlanSource::Heuristic => "heuristic",
        PlanSource::Manual => "manual",
    }
}

pub fn render_plan(plan: &Plan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Goal: {}", plan.goal);
    let _ = writeln!(
        out,
        "Plan {} ({}, confidence {:.2}, {} steps, ~{:.1}s)",
        plan.id,
        source_label(plan.source),
        plan.confidence,
        plan.steps.len(),
        plan.estimated_time_ms as f64 / 1000.0
    );
    if plan.steps.is_empty() {
        let _ = writeln!(out, "  (no steps: provide --url or --markup-file)");
    }
    for (index, step) in plan.steps.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}. {}{} [{}]",
            index + 1,
            step.description,
            if step.critical { " (critical)" } else { "" },
            step.engine
        );
        for fallback in &step.fallbacks {
            let _ = writeln!(out, "     fallback: {} [{}]", fallback.description, fallback.engine);
        }
    }
    for note in &plan.notes {
        let _ = writeln!(out, "  note: {note}");
    }
    out
}

pub fn render_execution(result: &ExecutionResult) -> String {
    let mut out = render_plan(&result.plan);
    let _ = writeln!(out);
    for (index, step) in result.results.iter().enumerate() {
        let status = match step.status {
            ActionStatus::Success => "ok",
            ActionStatus::Failed => "FAILED",
        };
        let engine = step
            .engine_used
            .map(|engine| engine.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  {}. [{status}] {} ({engine}, {}ms)",
            index + 1,
            step.description,
            step.execution_time_ms
        );
        for observation in &step.observations {
            let _ = writeln!(out, "     - {observation}");
        }
    }
    let verification = &result.verification;
    let _ = writeln!(
        out,
        "\nResult: {} (confidence {:.2}), {}/{} steps run, {} succeeded, in {}ms",
        if result.goal_achieved {
            "goal achieved"
        } else {
            "goal NOT achieved"
        },
        verification.confidence,
        result.steps_completed,
        result.steps_total,
        result.success_count(),
        result.elapsed_ms
    );
    let _ = writeln!(out, "Reasoning: {}", verification.reasoning);
    for line in &verification.evidence {
        let _ = writeln!(out, "  evidence: {line}");
    }
    for error in &result.errors {
        let _ = writeln!(out, "  error: {error}");
    }
    for suggestion in &verification.suggestions {
        let _ = writeln!(out, "  suggestion: {suggestion}");
    }
    out
}
