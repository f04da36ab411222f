//! Short textual observations attached to every action result.

use std::time::Duration;

use action_primitives::ActionKind;
use serde_json::Value;
use webpilot_core_types::EngineKind;

const OUTPUT_PREVIEW_CHARS: usize = 120;

const CONSENT_HINTS: &[&str] = &[
    "before you continue",
    "cookie consent",
    "accept all cookies",
    "we use cookies",
];
const CAPTCHA_HINTS: &[&str] = &[
    "captcha",
    "are you a robot",
    "human verification",
    "verify you are human",
];
const TRAFFIC_HINTS: &[&str] = &[
    "unusual traffic",
    "automated queries",
    "unusual activity",
];
const LOGIN_HINTS: &[&str] = &["log in to continue", "sign in to continue", "account required"];

/// Builds observation lines for action outcomes.
#[derive(Debug, Clone, Default)]
pub struct Observer;

impl Observer {
    pub fn new() -> Self {
        Self
    }

    pub fn observe(
        &self,
        action: &ActionKind,
        engine: Option<EngineKind>,
        output: Result<&Value, &str>,
        elapsed: Duration,
    ) -> Vec<String> {
        let mut observations = Vec::with_capacity(4);
        let engine = engine.map(EngineKind::as_str).unwrap_or("none");
        match output {
            Ok(value) => {
                observations.push(format!(
                    "{} succeeded on {engine} in {}ms",
                    action.name(),
                    elapsed.as_millis()
                ));
                if let Some(preview) = preview(value) {
                    observations.push(format!("output: {preview}"));
                }
                if let Some(kind) = detect_obstruction(value) {
                    observations.push(format!("obstruction: {kind}"));
                }
            }
            Err(error) => {
                observations.push(format!(
                    "{} failed on {engine} after {}ms",
                    action.name(),
                    elapsed.as_millis()
                ));
                observations.push(format!("error: {error}"));
            }
        }
        observations
    }
}

fn preview(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }
    if text.chars().count() <= OUTPUT_PREVIEW_CHARS {
        return Some(text);
    }
    let mut truncated: String = text.chars().take(OUTPUT_PREVIEW_CHARS).collect();
    truncated.push_str("...");
    Some(truncated)
}

/// Classifies pages that block automation.
pub fn detect_obstruction(value: &Value) -> Option<&'static str> {
    let mut blob = String::new();
    collect_text(value, &mut blob);
    if blob.trim().is_empty() {
        return None;
    }
    let blob = blob.to_lowercase();
    if contains_any(&blob, CONSENT_HINTS) {
        return Some("consent_gate");
    }
    if contains_any(&blob, CAPTCHA_HINTS) {
        return Some("captcha");
    }
    if contains_any(&blob, TRAFFIC_HINTS) {
        return Some("unusual_traffic");
    }
    if contains_any(&blob, LOGIN_HINTS) {
        return Some("login_wall");
    }
    None
}

fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(text) => {
            out.push_str(text);
            out.push(' ');
        }
        Value::Array(items) => items.iter().for_each(|item| collect_text(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_text(item, out)),
        _ => {}
    }
}

fn contains_any(blob: &str, hints: &[&str]) -> bool {
    hints.iter().any(|hint| blob.contains(hint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_observations_include_engine_and_preview() {
        let observations = Observer::new().observe(
            &ActionKind::GetText {
                selector: "h1".into(),
            },
            Some(EngineKind::Fetch),
            Ok(&json!({"text": "Welcome   home"})),
            Duration::from_millis(12),
        );
        assert_eq!(observations[0], "get_text succeeded on fetch in 12ms");
        assert!(observations[1].contains("Welcome home"));
        assert_eq!(observations.len(), 2);
    }

    #[test]
    fn failures_record_the_error() {
        let observations = Observer::new().observe(
            &ActionKind::GetMarkup,
            None,
            Err("no engine available"),
            Duration::ZERO,
        );
        assert_eq!(observations[0], "get_markup failed on none after 0ms");
        assert_eq!(observations[1], "error: no engine available");
    }

    #[test]
    fn long_output_is_truncated() {
        let long = "x".repeat(500);
        let text = preview(&Value::String(long)).unwrap();
        assert_eq!(text.chars().count(), OUTPUT_PREVIEW_CHARS + 3);
    }

    #[test]
    fn obstruction_hints_are_classified() {
        assert_eq!(
            detect_obstruction(&json!({"markup": "<p>Please solve the CAPTCHA</p>"})),
            Some("captcha")
        );
        assert_eq!(
            detect_obstruction(&json!({"text": "Our systems detected unusual traffic"})),
            Some("unusual_traffic")
        );
        assert_eq!(
            detect_obstruction(&json!(["Sign in to continue"])),
            Some("login_wall")
        );
        assert_eq!(
            detect_obstruction(&json!({"text": "Before you continue to Search"})),
            Some("consent_gate")
        );
        assert_eq!(detect_obstruction(&json!({"text": "Hello"})), None);
    }
}
