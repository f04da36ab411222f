use std::path::PathBuf;

use agent_core::PlanContext;
use anyhow::{Context, Result};
use clap::Args;
use tokio::fs;

/// Goal and page context shared by `plan` and `run`.
#[derive(Args, Clone, Debug)]
pub struct GoalArgs {
    /// What the automation should achieve
    pub goal: String,

    /// Page the goal starts from
    #[arg(short, long)]
    pub url: Option<String>,

    /// Already captured page markup
    #[arg(long, value_name = "FILE")]
    pub markup_file: Option<PathBuf>,

    /// Observations from earlier runs (repeatable)
    #[arg(long = "observation", value_name = "TEXT")]
    pub observations: Vec<String>,

    /// Maximum number of plan steps
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Structured steps to plan from (JSON array or {"steps": [...]})
    #[arg(long, value_name = "FILE")]
    pub plan_file: Option<PathBuf>,
}

impl GoalArgs {
    pub async fn plan_context(&self) -> Result<PlanContext> {
        let mut context = PlanContext {
            current_url: self.url.clone(),
            observations: self.observations.clone(),
            ..PlanContext::default()
        };
        if let Some(path) = &self.markup_file {
            let markup = fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read markup file {}", path.display()))?;
            context.markup = Some(markup);
        }
        Ok(context)
    }

    pub async fn reasoning_response(&self) -> Result<Option<String>> {
        match &self.plan_file {
            Some(path) => fs::read_to_string(path)
                .await
                .map(Some)
                .with_context(|| format!("Failed to read plan file {}", path.display())),
            None => Ok(None),
        }
    }
}
