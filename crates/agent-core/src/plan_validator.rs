//! Strict reading of reasoning output into [`Action`]s.
//!
//! A step record is `{kind, description, parameters, critical, engine?,
//! timeout_ms?, max_retries?, fallbacks?}`. Records that do not fit are
//! dropped one by one and reported as [`PlanValidationIssue`]s; the valid
//! remainder keeps its order.

use action_primitives::ActionKind;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use webpilot_core_types::EngineKind;

use crate::llm_provider::ReasoningOutput;
use crate::plan::{Action, DEFAULT_ACTION_TIMEOUT_MS};

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("fence pattern compiles")
});

/// Fallback chains deeper than this are rejected.
const MAX_FALLBACK_DEPTH: usize = 2;

/// Upper bound on per-step retries a step record may ask for.
pub const MAX_STEP_RETRIES: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanValidationIssue {
    #[error("response did not contain a step list: {0}")]
    Unparseable(String),
    #[error("step {index}: {reason}")]
    Schema { index: usize, reason: String },
    #[error("step {index}: unknown action kind '{kind}'")]
    UnknownKind { index: usize, kind: String },
    #[error("step {index}: '{kind}' does not accept parameter '{parameter}'")]
    UnknownParameter {
        index: usize,
        kind: String,
        parameter: String,
    },
    #[error("step {index}: parameter '{parameter}' must not be empty")]
    EmptyParameter { index: usize, parameter: String },
    #[error("step {index}: '{url}' is not an absolute http(s) url")]
    InvalidUrl { index: usize, url: String },
    #[error("step {index}: unknown engine '{engine}'")]
    UnknownEngine { index: usize, engine: String },
    #[error("step {index}: fallback rejected: {reason}")]
    Fallback { index: usize, reason: String },
    #[error("step {index}: timeout_ms {timeout_ms} is below the {required_ms}ms the action needs")]
    TimeoutTooShort {
        index: usize,
        timeout_ms: u64,
        required_ms: u64,
    },
}

/// One step record as proposed by the reasoning collaborator.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannedStep {
    pub kind: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default, alias = "criticality")]
    pub critical: bool,
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub fallbacks: Vec<Value>,
}

/// Values applied to fields a step record leaves out.
#[derive(Debug, Clone, Copy)]
pub struct StepDefaults {
    pub timeout_ms: u64,
    pub max_retries: u32,
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_ACTION_TIMEOUT_MS,
            max_retries: 0,
        }
    }
}

/// Outcome of validating a list of step records.
#[derive(Debug, Clone, Default)]
pub struct ValidatedSteps {
    pub actions: Vec<Action>,
    pub issues: Vec<PlanValidationIssue>,
}

impl ValidatedSteps {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Extracts the raw step records from a reasoning answer.
pub fn extract_steps(output: &ReasoningOutput) -> Result<Vec<Value>, PlanValidationIssue> {
    match output {
        ReasoningOutput::Steps(steps) => Ok(steps.clone()),
        ReasoningOutput::Text(text) => {
            let value = parse_json_payload(text).ok_or_else(|| {
                PlanValidationIssue::Unparseable(preview(text))
            })?;
            steps_from_value(value)
        }
    }
}

fn steps_from_value(value: Value) -> Result<Vec<Value>, PlanValidationIssue> {
    match value {
        Value::Array(steps) => Ok(steps),
        Value::Object(mut object) => match object.remove("steps") {
            Some(Value::Array(steps)) => Ok(steps),
            _ => Err(PlanValidationIssue::Unparseable(
                "object without a 'steps' array".to_string(),
            )),
        },
        other => Err(PlanValidationIssue::Unparseable(format!(
            "expected an array, got {}",
            json_type(&other)
        ))),
    }
}

fn parse_json_payload(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    for capture in FENCED_BLOCK.captures_iter(trimmed) {
        if let Some(body) = capture.get(1) {
            if let Ok(value) = serde_json::from_str(body.as_str().trim()) {
                return Some(value);
            }
        }
    }
    [('[', ']'), ('{', '}')].iter().find_map(|(open, close)| {
        let start = trimmed.find(*open)?;
        let end = trimmed.rfind(*close)?;
        if end <= start {
            return None;
        }
        serde_json::from_str(&trimmed[start..=end]).ok()
    })
}

/// Validates every record, keeping the valid ones in order.
pub fn validate_steps(steps: &[Value], defaults: StepDefaults) -> ValidatedSteps {
    let mut validated = ValidatedSteps::default();
    for (index, raw) in steps.iter().enumerate() {
        match validate_step(index, raw, defaults, 0) {
            Ok(action) => validated.actions.push(action),
            Err(issue) => validated.issues.push(issue),
        }
    }
    validated
}

fn validate_step(
    index: usize,
    raw: &Value,
    defaults: StepDefaults,
    depth: usize,
) -> Result<Action, PlanValidationIssue> {
    if !raw.is_object() {
        return Err(PlanValidationIssue::Schema {
            index,
            reason: format!("expected an object, got {}", json_type(raw)),
        });
    }
    let step: PlannedStep =
        serde_json::from_value(raw.clone()).map_err(|err| PlanValidationIssue::Schema {
            index,
            reason: err.to_string(),
        })?;

    let operation = build_operation(index, &step)?;
    let engine = match step.engine.as_deref() {
        None => EngineKind::Auto,
        Some(raw_engine) => {
            raw_engine
                .parse::<EngineKind>()
                .map_err(|_| PlanValidationIssue::UnknownEngine {
                    index,
                    engine: raw_engine.to_string(),
                })?
        }
    };

    if !step.fallbacks.is_empty() && depth >= MAX_FALLBACK_DEPTH {
        return Err(PlanValidationIssue::Fallback {
            index,
            reason: "fallback chain too deep".to_string(),
        });
    }
    let fallbacks = step
        .fallbacks
        .iter()
        .map(|fallback| {
            validate_step(index, fallback, defaults, depth + 1).map_err(|issue| {
                PlanValidationIssue::Fallback {
                    index,
                    reason: issue.to_string(),
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let description = step
        .description
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| operation.to_string());

    let mut action = Action::new(operation)
        .with_description(description)
        .on_engine(engine)
        .with_max_retries(
            step.max_retries
                .unwrap_or(defaults.max_retries)
                .min(MAX_STEP_RETRIES),
        );
    action = match step.timeout_ms {
        Some(timeout_ms) if timeout_ms < action.min_timeout_ms() => {
            return Err(PlanValidationIssue::TimeoutTooShort {
                index,
                timeout_ms,
                required_ms: action.min_timeout_ms(),
            });
        }
        Some(timeout_ms) => action.with_timeout_ms(timeout_ms),
        None => action.with_timeout_at_least(defaults.timeout_ms),
    };
    action.critical = step.critical;
    action.fallbacks = fallbacks;
    Ok(action)
}

fn build_operation(index: usize, step: &PlannedStep) -> Result<ActionKind, PlanValidationIssue> {
    let kind = step.kind.trim().to_ascii_lowercase();
    let mut record = step.parameters.clone();
    record.insert("kind".to_string(), Value::String(kind.clone()));

    let operation: ActionKind =
        serde_json::from_value(Value::Object(record)).map_err(|err| {
            if err.to_string().contains("unknown variant") {
                PlanValidationIssue::UnknownKind {
                    index,
                    kind: step.kind.clone(),
                }
            } else {
                PlanValidationIssue::Schema {
                    index,
                    reason: err.to_string(),
                }
            }
        })?;

    let accepted = match serde_json::to_value(&operation) {
        Ok(Value::Object(fields)) => fields,
        _ => Map::new(),
    };
    if let Some(parameter) = step.parameters.keys().find(|key| !accepted.contains_key(*key)) {
        return Err(PlanValidationIssue::UnknownParameter {
            index,
            kind,
            parameter: parameter.clone(),
        });
    }
    for (parameter, value) in &accepted {
        if matches!(value, Value::String(text) if text.trim().is_empty()) {
            return Err(PlanValidationIssue::EmptyParameter {
                index,
                parameter: parameter.clone(),
            });
        }
    }
    if let ActionKind::Navigate { url } = &operation {
        let absolute = url::Url::parse(url)
            .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !absolute {
            return Err(PlanValidationIssue::InvalidUrl {
                index,
                url: url.clone(),
            });
        }
    }
    Ok(operation)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn preview(text: &str) -> String {
    let mut preview: String = text.trim().chars().take(80).collect();
    if text.trim().chars().count() > 80 {
        preview.push_str("...");
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::WAIT_TIMEOUT_HEADROOM_MS;
    use serde_json::json;

    #[test]
    fn fenced_json_is_extracted() {
        let text = "Here is the plan:\n```json\n[{\"kind\":\"get_markup\"}]\n```\nGood luck.";
        let steps = extract_steps(&ReasoningOutput::Text(text.to_string())).unwrap();
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn steps_object_is_accepted() {
        let text = r#"{"steps": [{"kind": "wait", "parameters": {"duration_ms": 10}}]}"#;
        let steps = extract_steps(&ReasoningOutput::Text(text.to_string())).unwrap();
        let validated = validate_steps(&steps, StepDefaults::default());
        assert!(validated.is_clean());
        assert_eq!(
            validated.actions[0].operation,
            ActionKind::Wait { duration_ms: 10 }
        );
    }

    #[test]
    fn prose_is_unparseable() {
        let err = extract_steps(&ReasoningOutput::Text("just click it".into())).unwrap_err();
        assert!(matches!(err, PlanValidationIssue::Unparseable(_)));
    }

    #[test]
    fn unknown_fields_and_parameters_are_rejected() {
        let steps = vec![
            json!({"kind": "click", "parameters": {"selector": "#a"}, "priority": 3}),
            json!({"kind": "click", "parameters": {"selector": "#a", "button": "left"}}),
            json!({"kind": "teleport"}),
            json!({"kind": "click", "parameters": {"selector": "  "}}),
            json!({"kind": "navigate", "parameters": {"url": "example.com"}}),
            json!({"kind": "click", "parameters": {"selector": "#ok"}, "engine": "netscape"}),
            json!("click #ok"),
        ];
        let validated = validate_steps(&steps, StepDefaults::default());
        assert!(validated.actions.is_empty());
        assert!(matches!(validated.issues[0], PlanValidationIssue::Schema { index: 0, .. }));
        assert!(matches!(
            validated.issues[1],
            PlanValidationIssue::UnknownParameter { index: 1, .. }
        ));
        assert!(matches!(validated.issues[2], PlanValidationIssue::UnknownKind { index: 2, .. }));
        assert!(matches!(
            validated.issues[3],
            PlanValidationIssue::EmptyParameter { index: 3, .. }
        ));
        assert!(matches!(validated.issues[4], PlanValidationIssue::InvalidUrl { index: 4, .. }));
        assert!(matches!(
            validated.issues[5],
            PlanValidationIssue::UnknownEngine { index: 5, .. }
        ));
        assert!(matches!(validated.issues[6], PlanValidationIssue::Schema { index: 6, .. }));
    }

    #[test]
    fn valid_step_carries_all_fields() {
        let steps = vec![json!({
            "kind": "click",
            "description": "Press go",
            "parameters": {"selector": "#go"},
            "critical": true,
            "engine": "webdriver",
            "timeout_ms": 500,
            "max_retries": 2,
            "fallbacks": [
                {"kind": "execute_script", "parameters": {"script": "document.querySelector('#go').click()"}}
            ]
        })];
        let validated = validate_steps(&steps, StepDefaults::default());
        assert!(validated.is_clean());
        let action = &validated.actions[0];
        assert_eq!(action.description, "Press go");
        assert!(action.critical);
        assert_eq!(action.engine, EngineKind::WebDriver);
        assert_eq!(action.timeout_ms, 500);
        assert_eq!(action.max_retries, 2);
        assert_eq!(action.fallbacks.len(), 1);
        assert_eq!(action.fallbacks[0].timeout_ms, DEFAULT_ACTION_TIMEOUT_MS);
    }

    #[test]
    fn wait_deadline_covers_its_duration() {
        let defaults = StepDefaults {
            timeout_ms: 100,
            max_retries: 0,
        };
        let steps = vec![
            json!({"kind": "wait", "parameters": {"duration_ms": 300}}),
            json!({"kind": "wait", "parameters": {"duration_ms": 300}, "timeout_ms": 200}),
            json!({"kind": "wait", "parameters": {"duration_ms": 300}, "timeout_ms": 5000}),
        ];
        let validated = validate_steps(&steps, defaults);

        assert_eq!(validated.actions.len(), 2);
        assert_eq!(validated.actions[0].timeout_ms, 300 + WAIT_TIMEOUT_HEADROOM_MS);
        assert_eq!(validated.actions[1].timeout_ms, 5000);
        assert_eq!(
            validated.issues,
            vec![PlanValidationIssue::TimeoutTooShort {
                index: 1,
                timeout_ms: 200,
                required_ms: 300 + WAIT_TIMEOUT_HEADROOM_MS,
            }]
        );
    }

    #[test]
    fn requested_retries_are_capped() {
        let steps = vec![json!({
            "kind": "click",
            "parameters": {"selector": "#go"},
            "max_retries": 4_000_000_000u32
        })];
        let validated = validate_steps(&steps, StepDefaults::default());
        assert!(validated.is_clean());
        assert_eq!(validated.actions[0].max_retries, MAX_STEP_RETRIES);
    }

    #[test]
    fn invalid_fallback_rejects_the_step() {
        let steps = vec![json!({
            "kind": "click",
            "parameters": {"selector": "#go"},
            "fallbacks": [{"kind": "click"}]
        })];
        let validated = validate_steps(&steps, StepDefaults::default());
        assert!(validated.actions.is_empty());
        assert!(matches!(validated.issues[0], PlanValidationIssue::Fallback { .. }));
    }
}
