//! Sequential plan execution with retries, fallbacks and critical-step abort.

use std::sync::Arc;
use std::time::Instant;

use agent_core::{Action, Plan};
use chrono::Utc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};
use webpilot_core_types::SessionId;
use webpilot_registry::Dispatcher;

use crate::observer::Observer;
use crate::strategies::RetryPolicy;
use crate::types::{ActionResult, ActionStatus, ExecutionResult};
use crate::verifier::{GoalVerifier, HeuristicVerifier};

#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    pub retry: RetryPolicy,
}

/// Runs plans one action at a time against a single session.
pub struct Executor {
    dispatcher: Arc<Dispatcher>,
    verifier: Arc<dyn GoalVerifier>,
    observer: Observer,
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(dispatcher: Arc<Dispatcher>, config: ExecutorConfig) -> Self {
        Self {
            dispatcher,
            verifier: Arc::new(HeuristicVerifier::default()),
            observer: Observer::new(),
            config,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn GoalVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Executes `plan` (at most `max_steps` of it) and verifies the outcome.
    ///
    /// The session is resolved lazily before the first action; `None` uses
    /// the default session. Steps after a failed critical step are not run
    /// and leave no result.
    pub async fn execute(
        &self,
        plan: &Plan,
        session: Option<&SessionId>,
        max_steps: Option<usize>,
    ) -> ExecutionResult {
        let started_at = Utc::now();
        let started = Instant::now();
        let limit = max_steps.unwrap_or(plan.steps.len()).min(plan.steps.len());
        let mut resolved: Option<SessionId> = None;
        let mut results = Vec::with_capacity(limit);
        let mut errors = Vec::new();

        info!(plan = %plan.id, steps = limit, goal = %plan.goal, "executing plan");

        for (index, action) in plan.steps.iter().take(limit).enumerate() {
            let step_no = index + 1;
            let session_id = match &resolved {
                Some(id) => id.clone(),
                None => match self.dispatcher.sessions().resolve(session).await {
                    Ok(id) => {
                        resolved = Some(id.clone());
                        id
                    }
                    Err(err) => {
                        warn!(plan = %plan.id, step = step_no, error = %err, "session unavailable");
                        let message = format!("session unavailable: {err}");
                        errors.push(format!("step {step_no} ({}): {message}", action.description));
                        let mut result = ActionResult::not_dispatched(action, message.clone());
                        result.observations.push(format!("error: {message}"));
                        let stop = action.critical;
                        results.push(result);
                        if stop {
                            break;
                        }
                        continue;
                    }
                },
            };

            let result = self
                .run_step(step_no, action, &session_id, &mut errors)
                .await;
            let abort = result.critical && result.is_failed();
            results.push(result);
            if abort {
                warn!(
                    plan = %plan.id,
                    step = step_no,
                    skipped = limit - step_no,
                    "critical step failed; stopping plan"
                );
                break;
            }
        }

        let verification = self.verifier.verify(plan, &results);
        let execution = ExecutionResult {
            plan: plan.clone(),
            goal_achieved: verification.goal_achieved,
            steps_completed: results.len(),
            steps_total: plan.steps.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            results,
            errors,
            session_id: resolved.or_else(|| session.cloned()),
            verification,
            started_at,
        };
        info!(
            plan = %plan.id,
            completed = execution.steps_completed,
            total = execution.steps_total,
            achieved = execution.goal_achieved,
            confidence = execution.verification.confidence,
            "plan finished"
        );
        execution
    }

    /// One plan step: the action itself, then its fallbacks in order.
    async fn run_step(
        &self,
        step_no: usize,
        action: &Action,
        session: &SessionId,
        errors: &mut Vec<String>,
    ) -> ActionResult {
        let primary = self.run_action(action, action, session).await;
        if primary.is_success() {
            return primary;
        }
        errors.push(describe_failure(step_no, &primary));
        if action.fallbacks.is_empty() {
            return primary;
        }

        for (n, fallback) in action.fallbacks.iter().enumerate() {
            debug!(step = step_no, fallback = n + 1, action = %fallback.description, "trying fallback");
            let mut attempt = self.run_action(action, fallback, session).await;
            if attempt.is_success() {
                info!(step = step_no, fallback = n + 1, "fallback succeeded");
                attempt
                    .observations
                    .push(format!("recovered by fallback {} of {}", n + 1, action.fallbacks.len()));
                return attempt;
            }
            errors.push(describe_failure(step_no, &attempt));
        }
        warn!(step = step_no, "all fallbacks failed");
        primary
    }

    /// Dispatches `action` with its retry budget; the result is attributed to `step`.
    async fn run_action(&self, step: &Action, action: &Action, session: &SessionId) -> ActionResult {
        let deadline = Duration::from_millis(action.timeout_ms);
        let policy = &self.config.retry;
        let started = Instant::now();
        let mut attempt = 0u32;

        let outcome = loop {
            attempt += 1;
            let outcome = self
                .dispatcher
                .dispatch(&action.operation, action.engine, deadline, session)
                .await;
            let retry = matches!(
                &outcome.output,
                Err(err) if policy.should_retry(err, attempt, action.max_retries)
            );
            if !retry {
                break outcome;
            }
            let backoff = policy.backoff(attempt);
            if let Err(err) = &outcome.output {
                debug!(
                    action = %action.description,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "retrying action"
                );
            }
            sleep(backoff).await;
        };

        let elapsed = started.elapsed();
        let error = outcome.output.as_ref().err().map(ToString::to_string);
        let mut observations = self.observer.observe(
            &action.operation,
            outcome.engine,
            match (&outcome.output, &error) {
                (Ok(value), _) => Ok(value),
                (Err(_), message) => Err(message.as_deref().unwrap_or("failed")),
            },
            elapsed,
        );
        if outcome.fell_back {
            observations.push("engine fallback used".to_string());
        }
        if attempt > 1 {
            observations.push(format!("attempts: {attempt}"));
        }
        let (status, output) = match outcome.output {
            Ok(value) => (ActionStatus::Success, Some(value)),
            Err(_) => (ActionStatus::Failed, None),
        };

        ActionResult {
            step_id: step.id.clone(),
            action_id: action.id.clone(),
            description: action.description.clone(),
            critical: step.critical,
            status,
            output,
            error,
            execution_time_ms: elapsed.as_millis() as u64,
            engine_used: outcome.engine,
            observations,
            attempts: attempt,
        }
    }
}

fn describe_failure(step_no: usize, result: &ActionResult) -> String {
    format!(
        "step {step_no} ({}): {}",
        result.description,
        result.error.as_deref().unwrap_or("failed")
    )
}
