use anyhow::{bail, Result};
use clap::Args;
use tracing::{info, warn};
use webpilot_core_types::{EngineKind, SessionId};

use super::context::CliContext;
use super::goal::GoalArgs;
use super::output::{emit, render_execution};
use crate::app_context::{AppContext, AppOptions};

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub goal: GoalArgs,

    /// Engine to open the session on (cdp, webdriver, fetch, auto)
    #[arg(short, long)]
    pub engine: Option<EngineKind>,

    /// Session id to run in
    #[arg(long)]
    pub session: Option<String>,

    /// Use scripted engines instead of real backends
    #[arg(long)]
    pub dry_run: bool,

    /// Re-run failed steps once when the goal was not achieved
    #[arg(long)]
    pub retry_failed: bool,

    /// Exit with an error when the goal was not achieved
    #[arg(long)]
    pub require_success: bool,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext) -> Result<()> {
    let context = args.goal.plan_context().await?;
    let app = AppContext::build(
        ctx.config().clone(),
        AppOptions {
            dry_run: args.dry_run,
            reasoning_response: args.goal.reasoning_response().await?,
        },
    )
    .await?;
    let orchestrator = app.orchestrator();

    let plan = orchestrator
        .create_plan(&args.goal.goal, context, args.goal.max_steps)
        .await;

    let preference = args.engine.unwrap_or(app.config().engines.preference);
    let session = match args.session.clone() {
        Some(id) => Some(SessionId(id)),
        None if preference != EngineKind::Auto => {
            match orchestrator.open_session(preference, None).await {
                Ok(id) => Some(id),
                Err(err) => {
                    warn!(engine = %preference, error = %err, "could not open session on preferred engine; using default");
                    None
                }
            }
        }
        None => None,
    };

    let mut result = orchestrator
        .execute_plan(&plan, session.as_ref(), args.goal.max_steps)
        .await;
    if args.retry_failed && !result.goal_achieved && !result.failed_steps().is_empty() {
        info!(failed = result.failed_steps().len(), "retrying failed steps");
        result = orchestrator.retry_failed_steps(&result).await;
    }

    let report = orchestrator.shutdown().await;
    for error in &report.errors {
        warn!(%error, "cleanup error");
    }

    emit(ctx.output(), &result, render_execution)?;
    if args.require_success && !result.goal_achieved {
        bail!(
            "goal not achieved (confidence {:.2})",
            result.verification.confidence
        );
    }
    Ok(())
}
