//! Caller-facing plan / execute / verify loop.

use std::collections::HashMap;

use action_primitives::SessionOptions;
use agent_core::{Plan, PlanContext, Planner};
use tracing::info;
use webpilot_core_types::{EngineKind, SessionId};
use webpilot_registry::{CleanupReport, EngineHealth, SessionInfo};

use crate::errors::FlowError;
use crate::executor::Executor;
use crate::types::ExecutionResult;

/// Ties planner, executor and verifier together over one engine registry.
///
/// None of the plan/execute operations fail: expected problems are reported
/// inside the returned [`Plan`] or [`ExecutionResult`]. Call
/// [`Orchestrator::shutdown`] on every exit path to release sessions and
/// engines.
pub struct Orchestrator {
    planner: Planner,
    executor: Executor,
}

impl Orchestrator {
    pub fn new(planner: Planner, executor: Executor) -> Self {
        Self { planner, executor }
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub async fn create_plan(
        &self,
        goal: &str,
        context: PlanContext,
        max_steps: Option<usize>,
    ) -> Plan {
        self.planner.create_plan(goal, context, max_steps).await
    }

    pub async fn execute_plan(
        &self,
        plan: &Plan,
        session: Option<&SessionId>,
        max_steps: Option<usize>,
    ) -> ExecutionResult {
        self.executor.execute(plan, session, max_steps).await
    }

    /// Plans and executes in the default session.
    pub async fn create_and_execute(
        &self,
        goal: &str,
        context: PlanContext,
        max_steps: Option<usize>,
    ) -> ExecutionResult {
        let plan = self.create_plan(goal, context, max_steps).await;
        self.execute_plan(&plan, None, max_steps).await
    }

    /// Re-runs only the failed steps of `previous` in the same session.
    ///
    /// Returns `previous` unchanged when nothing failed.
    pub async fn retry_failed_steps(&self, previous: &ExecutionResult) -> ExecutionResult {
        let failed = previous.failed_steps();
        if failed.is_empty() {
            return previous.clone();
        }
        let plan = previous.plan.derive(failed);
        info!(
            plan = %plan.id,
            parent = %previous.plan.id,
            steps = plan.steps.len(),
            "retrying failed steps"
        );
        self.executor
            .execute(&plan, previous.session_id.as_ref(), None)
            .await
    }

    /// Opens a session explicitly instead of relying on the default one.
    pub async fn open_session(
        &self,
        preference: EngineKind,
        options: Option<SessionOptions>,
    ) -> Result<SessionId, FlowError> {
        Ok(self
            .executor
            .dispatcher()
            .sessions()
            .create(preference, options)
            .await?)
    }

    /// Closes a session; unknown ids are a no-op.
    pub async fn close_session(&self, session: &SessionId) -> Result<(), FlowError> {
        Ok(self.executor.dispatcher().sessions().close(session).await?)
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.executor.dispatcher().sessions().list()
    }

    pub fn engine_health(&self) -> HashMap<EngineKind, EngineHealth> {
        self.executor.dispatcher().registry().health_snapshot()
    }

    /// Closes every session and releases the engines. Never fails.
    pub async fn shutdown(&self) -> CleanupReport {
        let report = self.executor.dispatcher().sessions().close_all().await;
        info!(
            closed = report.closed,
            errors = report.errors.len(),
            "orchestrator shut down"
        );
        report
    }
}
