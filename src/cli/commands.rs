use clap::Subcommand;

use super::engines::EnginesArgs;
use super::plan::PlanArgs;
use super::run::RunArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Draft a plan for a goal without executing it
    Plan(PlanArgs),

    /// Plan, execute and verify a goal
    Run(RunArgs),

    /// Show registered engines and their health
    Engines(EnginesArgs),
}
