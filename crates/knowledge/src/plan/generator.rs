//! Retrieval-augmented plan generation.

use super::stages::{
    AbsoluteStage, GenerationOptions, GenerationStage, HeuristicStage, PlanModel, PlanStage,
    StageInput, StageOutcome,
};
use super::types::{PlanRequest, PlanResult, PlanStrategy};
use crate::cache::{cache_key, Cache};
use crate::types::Fragment;
use crate::vector_index::VectorIndex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use waypoint_core::{AppConfig, AppError, AppResult};
use waypoint_prompt::{builtin_prompt, load_prompt, PromptDefinition, PLAN_FALLBACK, PLAN_GENERATE};

/// Separator between retrieved fragments in the prompt context.
const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Prompts used by the two generation stages.
#[derive(Debug, Clone)]
pub struct PlanPrompts {
    pub generate: PromptDefinition,
    pub fallback: PromptDefinition,
}

impl PlanPrompts {
    /// The prompts compiled into the binary.
    pub fn builtin() -> AppResult<Self> {
        let missing = |id: &str| AppError::Prompt(format!("Built-in prompt '{}' missing", id));
        Ok(Self {
            generate: builtin_prompt(PLAN_GENERATE).ok_or_else(|| missing(PLAN_GENERATE))?,
            fallback: builtin_prompt(PLAN_FALLBACK).ok_or_else(|| missing(PLAN_FALLBACK))?,
        })
    }

    /// Built-ins, overridden by `.waypoint/prompts/<id>.yml` in `workspace`.
    pub fn load(workspace: &Path) -> AppResult<Self> {
        Ok(Self {
            generate: load_prompt(workspace, PLAN_GENERATE)?,
            fallback: load_prompt(workspace, PLAN_FALLBACK)?,
        })
    }
}

/// Planner tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanSettings {
    /// Fragments retrieved per request
    pub top_k: usize,
    pub generation: GenerationOptions,
    pub cache_entries: usize,
    pub cache_ttl: Duration,
}

impl Default for PlanSettings {
    fn default() -> Self {
        Self {
            top_k: 10,
            generation: GenerationOptions::default(),
            cache_entries: crate::cache::DEFAULT_MAX_ENTRIES,
            cache_ttl: Duration::from_secs(300),
        }
    }
}

impl PlanSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            generation: GenerationOptions {
                timeout: Duration::from_secs(config.generation.timeout_secs),
                max_tokens: config.generation.max_tokens,
                temperature: config.generation.temperature,
            },
            cache_entries: config.cache.max_entries,
            cache_ttl: Duration::from_secs(config.cache.ttl_secs),
        }
    }
}

/// Turns a task into ordered steps, degrading through the stage chain.
pub struct PlanGenerator {
    index: Arc<VectorIndex>,
    stages: Vec<Box<dyn PlanStage>>,
    cache: Arc<Cache<PlanResult>>,
    settings: PlanSettings,
}

impl PlanGenerator {
    /// Standard chain: primary generation, service-level fallback (when a
    /// fallback model is given), heuristic, absolute.
    pub fn new(
        index: Arc<VectorIndex>,
        primary: PlanModel,
        fallback: Option<PlanModel>,
        prompts: PlanPrompts,
        settings: PlanSettings,
    ) -> Self {
        let mut stages: Vec<Box<dyn PlanStage>> = vec![Box::new(GenerationStage::primary(
            primary,
            prompts.generate,
            settings.generation,
        ))];

        if let Some(fallback) = fallback {
            stages.push(Box::new(GenerationStage::service_fallback(
                fallback,
                prompts.fallback,
                settings.generation,
            )));
        }

        stages.push(Box::new(HeuristicStage));
        stages.push(Box::new(AbsoluteStage));

        Self::with_stages(index, stages, settings)
    }

    /// Custom chain. The absolute fallback still applies if every stage
    /// comes back empty.
    pub fn with_stages(
        index: Arc<VectorIndex>,
        stages: Vec<Box<dyn PlanStage>>,
        settings: PlanSettings,
    ) -> Self {
        Self {
            index,
            stages,
            cache: Arc::new(Cache::new(settings.cache_entries)),
            settings,
        }
    }

    /// The plan cache, e.g. for starting a sweeper.
    pub fn cache(&self) -> &Arc<Cache<PlanResult>> {
        &self.cache
    }

    /// Validate a raw task and plan it.
    ///
    /// Invalid input still yields the generic plan, with `error` set.
    pub async fn plan_task(&self, task: &str, notes: Option<String>) -> PlanResult {
        match PlanRequest::new(task, notes) {
            Ok(request) => self.plan(&request).await,
            Err(e) => {
                tracing::warn!("Rejected plan request: {}", e);
                let mut result =
                    PlanResult::from_draft(AbsoluteStage::draft(), PlanStrategy::Absolute, 0);
                result.error = Some(e.to_string());
                result
            }
        }
    }

    /// Plan a validated request. Never fails: every stage failure falls
    /// through to the next stage.
    #[tracing::instrument(skip(self, request), fields(task_len = request.task.len()))]
    pub async fn plan(&self, request: &PlanRequest) -> PlanResult {
        let mut error = None;

        let fragments: Vec<Fragment> = match self
            .index
            .search(&request.task, self.settings.top_k)
            .await
        {
            Ok(fragments) => fragments,
            Err(e) => {
                tracing::warn!("Retrieval failed, planning without context: {}", e);
                error = Some(format!("Retrieval failed: {}", e));
                Vec::new()
            }
        };

        let context = fragments
            .iter()
            .map(|f| f.content.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        tracing::debug!(
            "Retrieved {} fragments ({} chars of context)",
            fragments.len(),
            context.len()
        );

        let key = cache_key("plan", &(&request.task, &request.notes, &context));
        if let Ok(ref key) = key {
            if let Some(mut cached) = self.cache.get(key) {
                tracing::info!("Plan cache hit");
                cached.cached = true;
                return cached;
            }
        }

        let input = StageInput {
            task: &request.task,
            notes: request.notes.as_deref(),
            context: &context,
            fragments: &fragments,
        };

        let mut previous = StageOutcome::Empty;
        for stage in &self.stages {
            let strategy = stage.strategy();
            if !stage.should_run(&previous) {
                tracing::debug!("Skipping {} stage", strategy.as_str());
                continue;
            }

            match stage.run(&input).await {
                StageOutcome::Produced(draft) => {
                    tracing::info!(
                        "Plan produced by {} stage ({} steps)",
                        strategy.as_str(),
                        draft.steps.len()
                    );

                    let mut result = PlanResult::from_draft(draft, strategy, fragments.len());
                    result.error = error;

                    if strategy.is_generated() {
                        if let Ok(ref key) = key {
                            self.cache
                                .set(key.clone(), result.clone(), self.settings.cache_ttl);
                        }
                    }
                    return result;
                }
                outcome => {
                    tracing::debug!("{} stage produced nothing: {:?}", strategy.as_str(), outcome);
                    previous = outcome;
                }
            }
        }

        tracing::warn!("Every plan stage came back empty, using generic steps");
        let mut result =
            PlanResult::from_draft(AbsoluteStage::draft(), PlanStrategy::Absolute, fragments.len());
        result.error = error;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharBagEmbedder;
    use crate::store::KnowledgeStore;
    use crate::types::{ChunkOptions, DocumentFormat};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use waypoint_llm::{OllamaClient, OpenAiCompatibleClient};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MANUAL: &str = "Step 1: Open the File menu.\nStep 2: Click Export.\nStep 3: Choose PDF and press Save.";

    async fn index_with_manual() -> Arc<VectorIndex> {
        let index = Arc::new(VectorIndex::new(Arc::new(CharBagEmbedder::default())));
        let store = KnowledgeStore::new(index.clone(), ChunkOptions::default());
        store
            .add_document("manual.txt", MANUAL, DocumentFormat::Plain)
            .await
            .unwrap();
        index
    }

    fn empty_index() -> Arc<VectorIndex> {
        Arc::new(VectorIndex::new(Arc::new(CharBagEmbedder::default())))
    }

    fn request(task: &str) -> PlanRequest {
        PlanRequest::new(task, None).unwrap()
    }

    fn ollama_reply(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "llama3.2",
            "message": {"role": "assistant", "content": content},
            "done": true
        }))
    }

    fn generator(
        index: Arc<VectorIndex>,
        primary_url: &str,
        fallback_url: Option<&str>,
    ) -> PlanGenerator {
        let primary = PlanModel::new(Arc::new(OllamaClient::with_base_url(primary_url)), "llama3.2");
        let fallback = fallback_url.map(|url| {
            PlanModel::new(
                Arc::new(OpenAiCompatibleClient::with_base_url(url, None)),
                "local",
            )
        });
        PlanGenerator::new(
            index,
            primary,
            fallback,
            PlanPrompts::builtin().unwrap(),
            PlanSettings::default(),
        )
    }

    /// Stage that counts its runs and never produces.
    struct CountingStage {
        runs: Arc<AtomicUsize>,
        outcome: StageOutcome,
    }

    #[async_trait]
    impl PlanStage for CountingStage {
        fn strategy(&self) -> PlanStrategy {
            PlanStrategy::Primary
        }

        async fn run(&self, _input: &StageInput<'_>) -> StageOutcome {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    #[tokio::test]
    async fn test_primary_json_plan() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ollama_reply(
                r#"{"steps": ["Open the File menu", "Click Export"], "difficulty": "easy",
                    "subTasks": [{"name": "Format", "steps": ["Choose PDF"]}]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let generator = generator(index_with_manual().await, &server.uri(), None);
        let result = generator.plan(&request("Export as PDF")).await;

        assert_eq!(result.strategy, PlanStrategy::Primary);
        assert_eq!(
            result.steps,
            vec!["Open the File menu", "Click Export", "【Format】", "Choose PDF"]
        );
        assert_eq!(result.difficulty, "easy");
        assert_eq!(result.relevant_chunks_count, 1);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_prose_reply_is_mined() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ollama_reply(
                "Sure.\n1. Open the File menu\n2. Click Export\n3. Pick PDF format",
            ))
            .mount(&server)
            .await;

        let generator = generator(empty_index(), &server.uri(), None);
        let result = generator.plan(&request("Export as PDF")).await;

        assert_eq!(result.strategy, PlanStrategy::Primary);
        assert_eq!(
            result.steps,
            vec!["Open the File menu", "Click Export", "Pick PDF format"]
        );
    }

    #[tokio::test]
    async fn test_missing_model_uses_service_fallback() {
        let primary = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": "model \"llama3.2\" not found, try pulling it first"
            })))
            .mount(&primary)
            .await;

        let fallback = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant",
                    "content": "{\"steps\": [\"Open File\", \"Click Export\"]}"}}]
            })))
            .expect(1)
            .mount(&fallback)
            .await;

        let generator = generator(
            index_with_manual().await,
            &primary.uri(),
            Some(&fallback.uri()),
        );
        let result = generator.plan(&request("Export as PDF")).await;

        assert_eq!(result.strategy, PlanStrategy::ServiceFallback);
        assert_eq!(result.steps, vec!["Open File", "Click Export"]);
    }

    #[tokio::test]
    async fn test_unusable_reply_skips_service_fallback() {
        let primary = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ollama_reply("I cannot help with that."))
            .mount(&primary)
            .await;

        let fallback = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&fallback)
            .await;

        let generator = generator(
            index_with_manual().await,
            &primary.uri(),
            Some(&fallback.uri()),
        );
        let result = generator.plan(&request("Export as PDF")).await;

        assert_eq!(result.strategy, PlanStrategy::Heuristic);
    }

    #[tokio::test]
    async fn test_total_outage_uses_heuristic() {
        let primary = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&primary)
            .await;
        let fallback = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&fallback)
            .await;

        let generator = generator(
            index_with_manual().await,
            &primary.uri(),
            Some(&fallback.uri()),
        );
        let result = generator.plan(&request("Export as PDF")).await;

        assert_eq!(result.strategy, PlanStrategy::Heuristic);
        assert_eq!(result.steps, vec!["Open the File menu."]);
        assert_eq!(result.relevant_chunks_count, 1);
    }

    #[tokio::test]
    async fn test_outage_with_empty_index_uses_absolute() {
        let primary = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&primary)
            .await;

        let generator = generator(empty_index(), &primary.uri(), None);
        let result = generator.plan(&request("Export as PDF")).await;

        assert_eq!(result.strategy, PlanStrategy::Absolute);
        assert!(!result.steps.is_empty());
        assert_eq!(result.relevant_chunks_count, 0);
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        // Nothing listens on port 9 (discard) in the test environment
        let generator = generator(empty_index(), "http://127.0.0.1:9", Some("http://127.0.0.1:9"));
        let result = generator.plan(&request("Export as PDF")).await;
        assert!(!result.steps.is_empty());
    }

    #[tokio::test]
    async fn test_generated_plans_are_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ollama_reply(r#"{"steps": ["Open File", "Click Export"]}"#))
            .expect(1)
            .mount(&server)
            .await;

        let generator = generator(index_with_manual().await, &server.uri(), None);
        let first = generator.plan(&request("Export as PDF")).await;
        let second = generator.plan(&request("Export as PDF")).await;

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.steps, second.steps);
        assert_eq!(generator.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_plans_are_not_cached() {
        let runs = Arc::new(AtomicUsize::new(0));
        let generator = PlanGenerator::with_stages(
            empty_index(),
            vec![
                Box::new(CountingStage {
                    runs: runs.clone(),
                    outcome: StageOutcome::ServiceFailed,
                }),
                Box::new(AbsoluteStage),
            ],
            PlanSettings::default(),
        );

        generator.plan(&request("Export")).await;
        let result = generator.plan(&request("Export")).await;

        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(result.strategy, PlanStrategy::Absolute);
        assert!(!result.cached);
        assert!(generator.cache().is_empty());
    }

    #[tokio::test]
    async fn test_empty_chain_still_answers() {
        let runs = Arc::new(AtomicUsize::new(0));
        let generator = PlanGenerator::with_stages(
            empty_index(),
            vec![Box::new(CountingStage {
                runs: runs.clone(),
                outcome: StageOutcome::Empty,
            })],
            PlanSettings::default(),
        );

        let result = generator.plan(&request("Export")).await;
        assert_eq!(result.strategy, PlanStrategy::Absolute);
        assert!(result.steps.len() >= 3);
    }

    #[tokio::test]
    async fn test_invalid_task_returns_error_field() {
        let runs = Arc::new(AtomicUsize::new(0));
        let generator = PlanGenerator::with_stages(
            empty_index(),
            vec![Box::new(CountingStage {
                runs: runs.clone(),
                outcome: StageOutcome::Empty,
            })],
            PlanSettings::default(),
        );

        let result = generator.plan_task("   ", None).await;
        assert!(result.error.unwrap().contains("Task must not be empty"));
        assert!(!result.steps.is_empty());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_settings_from_config() {
        let config = AppConfig::default();
        let settings = PlanSettings::from_config(&config);
        assert_eq!(settings, PlanSettings::default());
    }
}
