use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::AgentError;
use crate::model::ContextSummary;

/// Raw answer of a reasoning collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningOutput {
    /// Free text expected to embed a JSON step list.
    Text(String),
    /// Already-structured step records.
    Steps(Vec<Value>),
}

/// Abstraction over whatever proposes plan steps for a goal.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    async fn propose_steps(
        &self,
        goal: &str,
        summary: &ContextSummary,
        max_steps: usize,
    ) -> Result<ReasoningOutput, AgentError>;
}

/// Deterministic provider used for tests, dry runs, and plan files.
#[derive(Debug, Default)]
pub struct StaticReasoningProvider {
    response: Option<ReasoningOutput>,
    calls: AtomicUsize,
}

impl StaticReasoningProvider {
    /// Provider that always reports itself unavailable.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn text(response: impl Into<String>) -> Self {
        Self::respond(ReasoningOutput::Text(response.into()))
    }

    pub fn steps(steps: Vec<Value>) -> Self {
        Self::respond(ReasoningOutput::Steps(steps))
    }

    pub fn respond(response: ReasoningOutput) -> Self {
        Self {
            response: Some(response),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningProvider for StaticReasoningProvider {
    async fn propose_steps(
        &self,
        goal: &str,
        _summary: &ContextSummary,
        _max_steps: usize,
    ) -> Result<ReasoningOutput, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if goal.trim().is_empty() {
            return Err(AgentError::invalid_output("goal is empty"));
        }
        self.response
            .clone()
            .ok_or_else(|| AgentError::unavailable("no reasoning backend configured"))
    }
}
