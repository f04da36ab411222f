use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::fmt::Write as _;

use super::context::CliContext;
use super::output::emit;
use crate::app_context::{AppContext, AppOptions};

#[derive(Args, Clone, Debug)]
pub struct EnginesArgs {
    /// Report scripted engines instead of real backends
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct EngineRow {
    engine: String,
    health: &'static str,
    priority: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EnginesReport {
    config: Option<String>,
    preference: String,
    engines: Vec<EngineRow>,
}

pub async fn cmd_engines(args: EnginesArgs, ctx: &CliContext) -> Result<()> {
    let app = AppContext::build(
        ctx.config().clone(),
        AppOptions {
            dry_run: args.dry_run,
            reasoning_response: None,
        },
    )
    .await?;

    let registry = app.registry();
    let health = registry.health_snapshot();
    let mut engines: Vec<EngineRow> = registry
        .registered()
        .into_iter()
        .map(|kind| EngineRow {
            engine: kind.to_string(),
            health: health
                .get(&kind)
                .map(|health| health.as_str())
                .unwrap_or("unknown"),
            priority: registry
                .priority()
                .iter()
                .position(|candidate| *candidate == kind)
                .map(|index| index + 1),
        })
        .collect();
    engines.sort_by_key(|row| row.priority.unwrap_or(usize::MAX));
    let report = EnginesReport {
        config: ctx.config_path().map(|path| path.display().to_string()),
        preference: app.config().engines.preference.to_string(),
        engines,
    };
    app.orchestrator().shutdown().await;

    emit(ctx.output(), &report, |report| {
        let mut out = format!(
            "Config: {}\nPreference: {}\n",
            report.config.as_deref().unwrap_or("(defaults)"),
            report.preference
        );
        if report.engines.is_empty() {
            out.push_str("  (no engines registered)\n");
        }
        for row in &report.engines {
            let _ = writeln!(
                out,
                "  {:<10} {:<10} priority {}",
                row.engine,
                row.health,
                row.priority
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".into())
            );
        }
        out
    })
}
