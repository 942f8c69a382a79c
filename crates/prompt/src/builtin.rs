//! Prompts compiled into the binary.
//!
//! Workspaces can override any of these by dropping a YAML file with the
//! same id into `.waypoint/prompts/`.

use crate::types::{PromptDefinition, PromptOutputSpec};

/// Primary plan generation prompt.
pub const PLAN_GENERATE: &str = "plan.generate";

/// System prompt of the direct fallback request.
pub const PLAN_FALLBACK: &str = "plan.fallback";

const PLAN_SHAPE: &str = r#"{
  "steps": ["step text", "..."],
  "estimatedTime": "e.g. 5 minutes",
  "difficulty": "easy | medium | hard",
  "requiresApproval": false,
  "hasErrorHandling": false,
  "subTasks": [{"name": "sub-task name", "steps": ["step text"]}]
}"#;

const PLAN_GENERATE_SYSTEM: &str = "You are an on-screen assistant that guides users through \
software UI tasks one concrete action at a time. Ground every step in the reference material \
when it is relevant. Reply with a single JSON object and nothing else.";

const PLAN_GENERATE_TEMPLATE: &str = r#"Task:
{{task}}

Reference material from the user's documents:
{{#if context}}{{context}}{{else}}(no matching documents){{/if}}
{{#if notes}}
Additional context:
{{notes}}
{{/if}}
Write an ordered list of short, imperative steps that complete the task. Name the exact buttons, menus and fields to use.
Respond with JSON in exactly this shape:
{{shape}}"#;

const PLAN_FALLBACK_SYSTEM: &str = "You turn a software task into an ordered list of UI steps. \
Respond only with a JSON object of this shape:\n{{shape}}";

const PLAN_FALLBACK_TEMPLATE: &str = r#"Task: {{task}}
{{#if context}}
Relevant documentation:
{{context}}
{{/if}}"#;

/// Look up a built-in prompt by id.
pub fn builtin_prompt(id: &str) -> Option<PromptDefinition> {
    let (title, system, template) = match id {
        PLAN_GENERATE => (
            "Plan generation",
            PLAN_GENERATE_SYSTEM,
            PLAN_GENERATE_TEMPLATE,
        ),
        PLAN_FALLBACK => (
            "Plan generation (direct fallback)",
            PLAN_FALLBACK_SYSTEM,
            PLAN_FALLBACK_TEMPLATE,
        ),
        _ => return None,
    };

    Some(PromptDefinition {
        id: id.to_string(),
        title: title.to_string(),
        api_version: "1.0".to_string(),
        created_by: "waypoint".to_string(),
        system: Some(system.to_string()),
        template: template.to_string(),
        output: PromptOutputSpec {
            format: "json".to_string(),
        },
    })
}

/// The JSON shape both plan prompts demand, exposed as the `shape` variable.
pub fn plan_shape() -> &'static str {
    PLAN_SHAPE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_resolve() {
        for id in [PLAN_GENERATE, PLAN_FALLBACK] {
            let def = builtin_prompt(id).unwrap();
            assert_eq!(def.id, id);
            assert_eq!(def.output.format, "json");
        }
        assert!(builtin_prompt("plan.unknown").is_none());
    }

    #[test]
    fn test_shape_lists_every_field() {
        for field in [
            "steps",
            "estimatedTime",
            "difficulty",
            "requiresApproval",
            "hasErrorHandling",
            "subTasks",
        ] {
            assert!(plan_shape().contains(field), "missing {}", field);
        }
    }
}
