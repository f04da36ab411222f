//! Goal verification without ground truth.

use agent_core::Plan;

use crate::errors::FlowError;
use crate::types::{ActionResult, VerificationResult};

pub const DEFAULT_SUCCESS_THRESHOLD: f64 = 0.7;

/// Confidence reported when a critical action failed.
const CRITICAL_FAILURE_CONFIDENCE: f64 = 0.1;

/// Decides whether a plan's results achieved its goal.
pub trait GoalVerifier: Send + Sync {
    fn verify(&self, plan: &Plan, results: &[ActionResult]) -> VerificationResult;
}

/// Success-rate heuristic: a critical failure always loses, otherwise the
/// share of successful results must reach the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicVerifier {
    threshold: f64,
}

impl Default for HeuristicVerifier {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SUCCESS_THRESHOLD,
        }
    }
}

impl HeuristicVerifier {
    pub fn with_threshold(threshold: f64) -> Result<Self, FlowError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(FlowError::InvalidThreshold(threshold));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl GoalVerifier for HeuristicVerifier {
    fn verify(&self, plan: &Plan, results: &[ActionResult]) -> VerificationResult {
        let total = results.len();
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let success_rate = if total == 0 {
            0.0
        } else {
            succeeded as f64 / total as f64
        };

        let mut evidence = vec![
            format!("{succeeded}/{total} actions succeeded"),
            format!("{} of {} planned steps executed", total, plan.steps.len()),
        ];

        if let Some(failed) = results.iter().find(|r| r.critical && r.is_failed()) {
            evidence.push(format!("critical step failed: {}", failed.description));
            return VerificationResult {
                goal_achieved: false,
                confidence: CRITICAL_FAILURE_CONFIDENCE,
                reasoning: "critical action failed".to_string(),
                evidence,
                suggestions: vec![
                    format!("fix or replace critical step '{}'", failed.description),
                    "manual verification recommended".to_string(),
                ],
            };
        }

        let goal_achieved = total > 0 && success_rate >= self.threshold;
        let reasoning = format!(
            "success rate {:.0}% is {} the {:.0}% threshold; goal {}",
            success_rate * 100.0,
            if success_rate >= self.threshold {
                "at or above"
            } else {
                "below"
            },
            self.threshold * 100.0,
            if goal_achieved {
                "considered achieved"
            } else {
                "not achieved"
            }
        );

        let mut suggestions = Vec::new();
        if total == 0 {
            suggestions.push("no actions were executed; provide a URL or page markup".to_string());
        }
        if succeeded < total {
            suggestions.push(format!("retry the {} failed step(s)", total - succeeded));
        }
        if !goal_achieved {
            suggestions.push("manual verification recommended".to_string());
        }

        VerificationResult {
            goal_achieved,
            confidence: success_rate,
            reasoning,
            evidence,
            suggestions,
        }
    }
}
