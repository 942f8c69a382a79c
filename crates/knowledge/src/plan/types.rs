//! Plan request and result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use waypoint_core::{AppError, AppResult};

/// Which stage of the fallback chain produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanStrategy {
    /// Primary generation service, JSON or prose reply
    Primary,
    /// Direct request to the alternate completion endpoint
    ServiceFallback,
    /// Steps mined from the retrieved fragments
    Heuristic,
    /// Fixed generic steps
    Absolute,
}

impl PlanStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::ServiceFallback => "service-fallback",
            Self::Heuristic => "heuristic",
            Self::Absolute => "absolute",
        }
    }

    /// Whether plans from this strategy go into the plan cache.
    pub fn is_generated(&self) -> bool {
        matches!(self, Self::Primary | Self::ServiceFallback)
    }
}

/// A named group of steps within a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTask {
    pub name: String,
    pub steps: Vec<String>,
}

/// What a stage hands back before the planner stamps on retrieval metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlanDraft {
    /// Flat step list, sub-task steps already merged in
    pub steps: Vec<String>,
    pub estimated_time: Option<String>,
    pub difficulty: Option<String>,
    pub requires_approval: bool,
    pub has_error_handling: bool,
    pub sub_tasks: Vec<SubTask>,
}

impl PlanDraft {
    pub fn from_steps(steps: Vec<String>) -> Self {
        Self {
            steps,
            ..Default::default()
        }
    }
}

/// A validated planning request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanRequest {
    pub task: String,
    /// Extra caller-supplied context (e.g. the current screen), not retrieved
    pub notes: Option<String>,
}

impl PlanRequest {
    /// Reject an empty task; blank notes are dropped.
    pub fn new(task: impl Into<String>, notes: Option<String>) -> AppResult<Self> {
        let task = task.into().trim().to_string();
        if task.is_empty() {
            return Err(AppError::InvalidInput("Task must not be empty".to_string()));
        }

        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Ok(Self { task, notes })
    }
}

/// Ordered steps for a task, plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResult {
    pub steps: Vec<String>,
    pub estimated_time: String,
    pub difficulty: String,
    pub requires_approval: bool,
    pub has_error_handling: bool,
    pub sub_tasks: Vec<SubTask>,
    pub relevant_chunks_count: usize,
    pub timestamp: DateTime<Utc>,
    pub strategy: PlanStrategy,
    /// Served from the plan cache
    #[serde(default)]
    pub cached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlanResult {
    /// Fill in defaults for anything the stage did not report.
    pub fn from_draft(
        draft: PlanDraft,
        strategy: PlanStrategy,
        relevant_chunks_count: usize,
    ) -> Self {
        let estimated_time = draft
            .estimated_time
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| estimate_time(draft.steps.len()));
        let difficulty = draft
            .difficulty
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| "medium".to_string());

        Self {
            steps: draft.steps,
            estimated_time,
            difficulty,
            requires_approval: draft.requires_approval,
            has_error_handling: draft.has_error_handling,
            sub_tasks: draft.sub_tasks,
            relevant_chunks_count,
            timestamp: Utc::now(),
            strategy,
            cached: false,
            error: None,
        }
    }
}

/// Rough duration for a plan with `step_count` steps, two minutes per step.
fn estimate_time(step_count: usize) -> String {
    format!("about {} minutes", (step_count * 2).max(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        let request = PlanRequest::new("  Export a PDF ", Some("   ".to_string())).unwrap();
        assert_eq!(request.task, "Export a PDF");
        assert_eq!(request.notes, None);

        let err = PlanRequest::new(" \n", None).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_result_defaults() {
        let draft = PlanDraft::from_steps(vec!["Open File".into(), "Click Save".into()]);
        let result = PlanResult::from_draft(draft, PlanStrategy::Heuristic, 3);

        assert_eq!(result.estimated_time, "about 4 minutes");
        assert_eq!(result.difficulty, "medium");
        assert_eq!(result.relevant_chunks_count, 3);
        assert!(!result.cached);
    }

    #[test]
    fn test_result_keeps_reported_metadata() {
        let draft = PlanDraft {
            steps: vec!["Open File".into()],
            estimated_time: Some("2 minutes".into()),
            difficulty: Some(" Easy ".into()),
            requires_approval: true,
            ..Default::default()
        };
        let result = PlanResult::from_draft(draft, PlanStrategy::Primary, 0);

        assert_eq!(result.estimated_time, "2 minutes");
        assert_eq!(result.difficulty, "easy");
        assert!(result.requires_approval);
    }

    #[test]
    fn test_result_wire_shape() {
        let draft = PlanDraft::from_steps(vec!["Open File".into()]);
        let result = PlanResult::from_draft(draft, PlanStrategy::ServiceFallback, 1);
        let json = serde_json::to_value(&result).unwrap();

        for field in [
            "steps",
            "estimatedTime",
            "difficulty",
            "requiresApproval",
            "hasErrorHandling",
            "subTasks",
            "relevantChunksCount",
            "timestamp",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(json["strategy"], "service-fallback");
        assert!(json.get("error").is_none());
        // RFC 3339 / ISO 8601
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }
}
