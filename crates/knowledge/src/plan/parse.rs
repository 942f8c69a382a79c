//! Turning raw generation-service replies into plan drafts.
//!
//! Replies are untrusted: the JSON object is checked field by field and any
//! mismatch counts as a parse failure, after which the text is scanned for
//! step markers instead.

use super::types::{PlanDraft, SubTask};
use crate::mining::extract_steps;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Opening of a `steps` array: `"steps": [`.
static STEPS_ARRAY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""steps"\s*:\s*\["#).expect("valid regex"));

/// A complete JSON string literal at the start of the input.
static STRING_LITERAL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^"(?:[^"\\]|\\.)*""#).expect("valid regex"));

/// A leading "Step 2:", circled numeral or "3." list marker.
static LEADING_MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)\s*(?:step\s*\d+\s*[:：]|[\x{2460}-\x{2473}]|\d+[.)]\s+)\s*")
        .expect("valid regex")
});

/// The span from the first `{` to the last `}`, if any.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse a reply: the embedded JSON object first, then step markers in prose.
pub fn parse_generation(text: &str) -> Option<PlanDraft> {
    if let Some(draft) = parse_plan_json(text) {
        return Some(draft);
    }

    let salvaged = salvage_steps(text);
    if !salvaged.is_empty() {
        tracing::debug!("Salvaged {} steps from a cut-off plan object", salvaged.len());
        return Some(PlanDraft::from_steps(salvaged));
    }

    let steps = extract_steps(text);
    if steps.is_empty() {
        tracing::debug!("Reply contained neither a plan object nor step markers");
        return None;
    }

    tracing::debug!("Extracted {} steps from prose reply", steps.len());
    Some(PlanDraft::from_steps(steps))
}

/// Read the string literals of a `steps` array that never closed, as when
/// the reply hit its token limit. A trailing unterminated literal is kept
/// up to the end of its line.
fn salvage_steps(text: &str) -> Vec<String> {
    let Some(open) = STEPS_ARRAY_REGEX.find(text) else {
        return Vec::new();
    };

    let mut literals = Vec::new();
    let mut rest = &text[open.end()..];

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if !rest.starts_with('"') {
            break;
        }

        match STRING_LITERAL_REGEX.find(rest) {
            Some(literal) => {
                if let Ok(value) = serde_json::from_str::<String>(literal.as_str()) {
                    literals.push(value);
                }
                rest = &rest[literal.end()..];
            }
            None => {
                let tail = rest[1..].lines().next().unwrap_or_default();
                literals.push(tail.replace("\\\"", "\""));
                break;
            }
        }
    }

    literals
        .iter()
        .map(|step| LEADING_MARKER_REGEX.replace(step, "").trim().to_string())
        .filter(|step| !step.is_empty())
        .collect()
}

/// Parse and validate the JSON plan object embedded in `text`.
pub fn parse_plan_json(text: &str) -> Option<PlanDraft> {
    let json = extract_json_object(text)?;

    let value: Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("Plan JSON did not parse: {}", e);
            return None;
        }
    };

    match validate_plan(&value) {
        Ok(draft) => Some(draft),
        Err(reason) => {
            tracing::debug!("Plan JSON rejected: {}", reason);
            None
        }
    }
}

fn validate_plan(value: &Value) -> Result<PlanDraft, String> {
    let object = value.as_object().ok_or("top level is not an object")?;

    let mut steps = string_list(object.get("steps"), "steps")?.ok_or("missing steps")?;

    let estimated_time = match object.get("estimatedTime") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(format!("{} minutes", n)),
        Some(_) => return Err("estimatedTime is not a string".to_string()),
    };

    let difficulty = optional_string(object, "difficulty")?;
    let requires_approval = optional_bool(object, "requiresApproval")?;
    let has_error_handling = optional_bool(object, "hasErrorHandling")?;
    let sub_tasks = sub_tasks(object.get("subTasks"))?;

    for sub_task in &sub_tasks {
        if sub_task.steps.is_empty() {
            continue;
        }
        steps.push(format!("【{}】", sub_task.name));
        steps.extend(sub_task.steps.iter().cloned());
    }

    if steps.is_empty() {
        return Err("no steps".to_string());
    }

    Ok(PlanDraft {
        steps,
        estimated_time,
        difficulty,
        requires_approval,
        has_error_handling,
        sub_tasks,
    })
}

/// An array of strings, trimmed with blanks dropped. `None` when absent.
fn string_list(value: Option<&Value>, field: &str) -> Result<Option<Vec<String>>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| format!("{} contains a non-string item", field))
            })
            .filter(|item| !matches!(item, Ok(s) if s.is_empty()))
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(format!("{} is not an array", field)),
    }
}

fn optional_string(object: &Map<String, Value>, field: &str) -> Result<Option<String>, String> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(format!("{} is not a string", field)),
    }
}

fn optional_bool(object: &Map<String, Value>, field: &str) -> Result<bool, String> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(format!("{} is not a boolean", field)),
    }
}

fn sub_tasks(value: Option<&Value>) -> Result<Vec<SubTask>, String> {
    let items = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err("subTasks is not an array".to_string()),
    };

    items
        .iter()
        .map(|item| -> Result<SubTask, String> {
            let object = item.as_object().ok_or("subTasks item is not an object")?;
            let name = optional_string(object, "name")?
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .ok_or("subTasks item has no name")?;
            let steps = string_list(object.get("steps"), "subTasks.steps")?.unwrap_or_default();
            Ok(SubTask { name, steps })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_object() {
        assert_eq!(
            extract_json_object("Sure! ```json\n{\"a\": {\"b\": 1}}\n``` done"),
            Some("{\"a\": {\"b\": 1}}")
        );
        assert_eq!(extract_json_object("no braces"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn test_full_plan() {
        let reply = r#"Here is the plan:
{
  "steps": ["Open the File menu", "Click Export"],
  "estimatedTime": "3 minutes",
  "difficulty": "easy",
  "requiresApproval": false,
  "hasErrorHandling": true,
  "subTasks": [{"name": "Choose format", "steps": ["Select PDF", "Click OK"]}]
}"#;
        let draft = parse_generation(reply).unwrap();

        assert_eq!(
            draft.steps,
            vec![
                "Open the File menu",
                "Click Export",
                "【Choose format】",
                "Select PDF",
                "Click OK"
            ]
        );
        assert_eq!(draft.estimated_time.as_deref(), Some("3 minutes"));
        assert_eq!(draft.difficulty.as_deref(), Some("easy"));
        assert!(draft.has_error_handling);
        assert_eq!(draft.sub_tasks.len(), 1);
    }

    #[test]
    fn test_minimal_plan() {
        let draft = parse_plan_json(r#"{"steps": ["Open settings", "  ", "Toggle dark mode"]}"#)
            .unwrap();
        assert_eq!(draft.steps, vec!["Open settings", "Toggle dark mode"]);
        assert!(!draft.requires_approval);
        assert!(draft.sub_tasks.is_empty());
    }

    #[test]
    fn test_numeric_estimate() {
        let draft =
            parse_plan_json(r#"{"steps": ["Open settings"], "estimatedTime": 5}"#).unwrap();
        assert_eq!(draft.estimated_time.as_deref(), Some("5 minutes"));
    }

    #[test]
    fn test_shape_mismatches_rejected() {
        for reply in [
            r#"{"steps": "Open settings"}"#,
            r#"{"steps": [1, 2]}"#,
            r#"{"steps": []}"#,
            r#"{"estimatedTime": "5 minutes"}"#,
            r#"{"steps": ["Open settings"], "requiresApproval": "no"}"#,
            r#"{"steps": ["Open settings"], "subTasks": [{"steps": ["x"]}]}"#,
            r#"{"steps": ["Open settings"], "subTasks": "none"}"#,
        ] {
            assert!(parse_plan_json(reply).is_none(), "accepted {}", reply);
        }
    }

    #[test]
    fn test_sub_tasks_alone_are_enough() {
        let draft = parse_plan_json(
            r#"{"steps": [], "subTasks": [{"name": "Prepare", "steps": ["Open the report"]}]}"#,
        )
        .unwrap();
        assert_eq!(draft.steps, vec!["【Prepare】", "Open the report"]);
    }

    #[test]
    fn test_prose_fallback() {
        let reply = "I can't produce JSON, but:\nStep 1: Open the File menu\nStep 2: Click Save As";
        let draft = parse_generation(reply).unwrap();
        assert_eq!(draft.steps, vec!["Open the File menu", "Click Save As"]);
        assert_eq!(draft.estimated_time, None);
    }

    #[test]
    fn test_cut_off_json_keeps_clean_steps() {
        let reply = r#"{"steps": ["Step 1: Open settings", "Step 2: Click Apply"#;
        assert!(parse_plan_json(reply).is_none());
        let draft = parse_generation(reply).unwrap();
        assert_eq!(draft.steps, vec!["Open settings", "Click Apply"]);
    }

    #[test]
    fn test_cut_off_json_with_trailing_literal() {
        let reply = r#"{"steps": ["Step 1: Open settings", "Step 2: Click Apply", "Step 3: Close the dialog"#;
        let draft = parse_generation(reply).unwrap();
        assert_eq!(
            draft.steps,
            vec!["Open settings", "Click Apply", "Close the dialog"]
        );
    }

    #[test]
    fn test_cut_off_json_keeps_quoted_labels() {
        let reply = r#"Here you go: {"steps": ["Click \"Save\"", "Choose PDF", "Press \"OK"#;
        let draft = parse_generation(reply).unwrap();
        assert_eq!(draft.steps, vec![r#"Click "Save""#, "Choose PDF", r#"Press "OK"#]);
    }

    #[test]
    fn test_nothing_usable() {
        assert!(parse_generation("I'm not sure how to help with that.").is_none());
        assert!(parse_generation("").is_none());
    }
}
