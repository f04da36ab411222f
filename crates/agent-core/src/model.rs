use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::analysis::ElementCounts;

/// Observations carried into the reasoning summary.
const RECENT_OBSERVATIONS: usize = 5;

/// Snapshot of what is known about the target when a plan is requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanContext {
    /// Page markup, when already captured.
    #[serde(default)]
    pub markup: Option<String>,
    /// Last known URL.
    #[serde(default)]
    pub current_url: Option<String>,
    /// Free-form observations from earlier executions.
    #[serde(default)]
    pub observations: Vec<String>,
    /// Arbitrary caller metadata, passed through untouched.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl PlanContext {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.current_url = Some(url.into());
        self
    }

    pub fn with_markup(mut self, markup: impl Into<String>) -> Self {
        self.markup = Some(markup.into());
        self
    }

    pub fn with_observation(mut self, observation: impl Into<String>) -> Self {
        self.observations.push(observation.into());
        self
    }

    pub fn url(&self) -> Option<&str> {
        self.current_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn has_markup(&self) -> bool {
        self.markup
            .as_deref()
            .map(|markup| !markup.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Cheap digest of a [`PlanContext`] handed to the reasoning collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    pub has_markup: bool,
    pub has_url: bool,
    pub current_url: Option<String>,
    pub markup_bytes: usize,
    pub observation_count: usize,
    pub recent_observations: Vec<String>,
    pub elements: Option<ElementCounts>,
}

impl ContextSummary {
    pub fn from_context(context: &PlanContext, elements: Option<ElementCounts>) -> Self {
        let skip = context
            .observations
            .len()
            .saturating_sub(RECENT_OBSERVATIONS);
        Self {
            has_markup: context.has_markup(),
            has_url: context.url().is_some(),
            current_url: context.url().map(str::to_string),
            markup_bytes: context.markup.as_ref().map(String::len).unwrap_or(0),
            observation_count: context.observations.len(),
            recent_observations: context.observations.iter().skip(skip).cloned().collect(),
            elements,
        }
    }

    /// Whether the context carries any signal to plan against.
    pub fn has_signal(&self) -> bool {
        self.has_url || self.has_markup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_url_and_markup_are_ignored() {
        let context = PlanContext::default().with_url("   ").with_markup("\n");
        let summary = ContextSummary::from_context(&context, None);
        assert!(!summary.has_signal());
        assert_eq!(summary.current_url, None);
    }

    #[test]
    fn summary_keeps_latest_observations() {
        let mut context = PlanContext::default().with_url("https://example.com");
        for i in 0..8 {
            context = context.with_observation(format!("obs-{i}"));
        }
        let summary = ContextSummary::from_context(&context, None);
        assert_eq!(summary.observation_count, 8);
        assert_eq!(summary.recent_observations.first().unwrap(), "obs-3");
        assert_eq!(summary.recent_observations.len(), RECENT_OBSERVATIONS);
    }
}
