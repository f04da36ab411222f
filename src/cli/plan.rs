use anyhow::Result;
use clap::Args;

use super::context::CliContext;
use super::goal::GoalArgs;
use super::output::{emit, render_plan};
use crate::app_context::{AppContext, AppOptions};

#[derive(Args, Clone, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub goal: GoalArgs,
}

pub async fn cmd_plan(args: PlanArgs, ctx: &CliContext) -> Result<()> {
    let context = args.goal.plan_context().await?;
    let app = AppContext::build(
        ctx.config().clone(),
        AppOptions {
            dry_run: true,
            reasoning_response: args.goal.reasoning_response().await?,
        },
    )
    .await?;

    let plan = app
        .orchestrator()
        .create_plan(&args.goal.goal, context, args.goal.max_steps)
        .await;
    app.orchestrator().shutdown().await;

    emit(ctx.output(), &plan, render_plan)
}
