//! The degrading chain of plan stages.
//!
//! Each stage either produces a draft or reports why it did not, and the
//! generator walks them in order until one produces.

use super::parse::parse_generation;
use super::types::{PlanDraft, PlanStrategy};
use crate::mining::extract_steps;
use crate::types::Fragment;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use unicode_segmentation::UnicodeSegmentation;
use waypoint_llm::{is_model_unavailable, LlmClient, LlmRequest};
use waypoint_prompt::{build_prompt, plan_shape, PromptDefinition};

/// Fragments the heuristic stage looks at.
const HEURISTIC_FRAGMENTS: usize = 6;

/// Length of the snippet used when a fragment has no step marker.
const SNIPPET_GRAPHEMES: usize = 50;

/// Heuristic steps shorter than this are dropped.
const MIN_HEURISTIC_CHARS: usize = 10;

/// Steps returned when nothing else worked.
const GENERIC_STEPS: [&str; 4] = [
    "Open the application you want to work in",
    "Find the menu or panel that contains the feature you need",
    "Follow the on-screen prompts to complete the task",
    "Check the result and save your work",
];

/// Everything a stage may draw on.
#[derive(Debug, Clone, Copy)]
pub struct StageInput<'a> {
    pub task: &'a str,
    pub notes: Option<&'a str>,
    /// Retrieved fragment contents joined into one blob
    pub context: &'a str,
    /// Retrieved fragments, best first
    pub fragments: &'a [Fragment],
}

/// Result of running one stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Produced(PlanDraft),
    /// The stage ran but had nothing usable
    Empty,
    /// The generation service was unreachable, errored or timed out
    ServiceFailed,
}

/// One step of the fallback chain.
#[async_trait]
pub trait PlanStage: Send + Sync {
    fn strategy(&self) -> PlanStrategy;

    /// Whether to run, given the outcome of the stage before it.
    fn should_run(&self, _previous: &StageOutcome) -> bool {
        true
    }

    async fn run(&self, input: &StageInput<'_>) -> StageOutcome;
}

/// A model on a generation service.
#[derive(Clone)]
pub struct PlanModel {
    pub client: Arc<dyn LlmClient>,
    pub model: String,
}

impl PlanModel {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl std::fmt::Debug for PlanModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanModel")
            .field("provider", &self.client.provider_name())
            .field("model", &self.model)
            .finish()
    }
}

/// Request knobs shared by both generation stages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_tokens: 1500,
            temperature: 0.3,
        }
    }
}

/// Ask a generation service for a plan and parse the reply.
///
/// Used twice: as the primary stage, and as the service-level fallback that
/// only runs after the primary service failed.
pub struct GenerationStage {
    strategy: PlanStrategy,
    model: PlanModel,
    prompt: PromptDefinition,
    options: GenerationOptions,
}

impl GenerationStage {
    pub fn primary(model: PlanModel, prompt: PromptDefinition, options: GenerationOptions) -> Self {
        Self {
            strategy: PlanStrategy::Primary,
            model,
            prompt,
            options,
        }
    }

    pub fn service_fallback(
        model: PlanModel,
        prompt: PromptDefinition,
        options: GenerationOptions,
    ) -> Self {
        Self {
            strategy: PlanStrategy::ServiceFallback,
            model,
            prompt,
            options,
        }
    }

    fn build_request(&self, input: &StageInput<'_>) -> Option<LlmRequest> {
        let mut variables = HashMap::new();
        variables.insert("task".to_string(), input.task.to_string());
        variables.insert("context".to_string(), input.context.to_string());
        variables.insert(
            "notes".to_string(),
            input.notes.unwrap_or_default().to_string(),
        );
        variables.insert("shape".to_string(), plan_shape().to_string());

        let built = match build_prompt(&self.prompt, variables) {
            Ok(built) => built,
            Err(e) => {
                tracing::warn!("Failed to render prompt '{}': {}", self.prompt.id, e);
                return None;
            }
        };

        let mut request = LlmRequest::new(built.user, self.model.model.clone())
            .with_max_tokens(self.options.max_tokens)
            .with_temperature(self.options.temperature);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        tracing::debug!("Prompt '{}' rendered for {}", self.prompt.id, self.strategy.as_str());
        Some(request)
    }
}

#[async_trait]
impl PlanStage for GenerationStage {
    fn strategy(&self) -> PlanStrategy {
        self.strategy
    }

    fn should_run(&self, previous: &StageOutcome) -> bool {
        match self.strategy {
            PlanStrategy::ServiceFallback => matches!(previous, StageOutcome::ServiceFailed),
            _ => true,
        }
    }

    async fn run(&self, input: &StageInput<'_>) -> StageOutcome {
        let Some(request) = self.build_request(input) else {
            return StageOutcome::ServiceFailed;
        };

        let provider = self.model.client.provider_name();
        let reply =
            tokio::time::timeout(self.options.timeout, self.model.client.complete(&request)).await;

        let response = match reply {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if is_model_unavailable(&e) => {
                tracing::warn!(
                    "Model '{}' not available on {} ({}): {}",
                    self.model.model,
                    provider,
                    self.strategy.as_str(),
                    e
                );
                return StageOutcome::ServiceFailed;
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    "Generation via {} failed ({}): {}",
                    provider,
                    self.strategy.as_str(),
                    e
                );
                return StageOutcome::ServiceFailed;
            }
            Err(_) => {
                tracing::warn!(
                    "Generation via {} timed out after {:?} ({})",
                    provider,
                    self.options.timeout,
                    self.strategy.as_str()
                );
                return StageOutcome::ServiceFailed;
            }
        };

        tracing::debug!(
            "Reply from {} ({} chars, {} tokens)",
            provider,
            response.content.len(),
            response.usage.total_tokens
        );

        match parse_generation(&response.content) {
            Some(draft) => StageOutcome::Produced(draft),
            None => {
                tracing::warn!(
                    "Reply from {} had no usable steps ({})",
                    provider,
                    self.strategy.as_str()
                );
                StageOutcome::Empty
            }
        }
    }
}

/// Mine steps straight out of the retrieved fragments.
#[derive(Debug, Default)]
pub struct HeuristicStage;

impl HeuristicStage {
    fn step_for(fragment: &Fragment) -> String {
        if let Some(step) = extract_steps(&fragment.content).into_iter().next() {
            return step;
        }

        let flat = fragment
            .content
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let mut graphemes = flat.graphemes(true);
        let head: String = graphemes.by_ref().take(SNIPPET_GRAPHEMES).collect();
        if graphemes.next().is_some() {
            format!("{}...", head)
        } else {
            head
        }
    }
}

#[async_trait]
impl PlanStage for HeuristicStage {
    fn strategy(&self) -> PlanStrategy {
        PlanStrategy::Heuristic
    }

    async fn run(&self, input: &StageInput<'_>) -> StageOutcome {
        let steps: Vec<String> = input
            .fragments
            .iter()
            .take(HEURISTIC_FRAGMENTS)
            .map(Self::step_for)
            .filter(|step| step.chars().count() >= MIN_HEURISTIC_CHARS)
            .collect();

        if steps.is_empty() {
            StageOutcome::Empty
        } else {
            StageOutcome::Produced(PlanDraft::from_steps(steps))
        }
    }
}

/// Fixed generic steps. Always produces.
#[derive(Debug, Default)]
pub struct AbsoluteStage;

impl AbsoluteStage {
    pub fn draft() -> PlanDraft {
        PlanDraft::from_steps(GENERIC_STEPS.iter().map(|s| s.to_string()).collect())
    }
}

#[async_trait]
impl PlanStage for AbsoluteStage {
    fn strategy(&self) -> PlanStrategy {
        PlanStrategy::Absolute
    }

    async fn run(&self, _input: &StageInput<'_>) -> StageOutcome {
        StageOutcome::Produced(Self::draft())
    }
}
