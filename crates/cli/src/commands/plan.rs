//! Plan command handler.

use super::{ingest, print_json};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use waypoint_core::{config::AppConfig, AppResult};
use waypoint_knowledge::{PlanGenerator, PlanModel, PlanPrompts, PlanResult, PlanSettings};
use waypoint_llm::{create_client, ClientOptions};

/// Provider used for a fallback endpoint when no fallback provider is named.
const DEFAULT_FALLBACK_PROVIDER: &str = "openai";

/// Generate a step-by-step plan for a task
#[derive(Args, Debug)]
pub struct PlanCommand {
    /// What you want to get done
    pub task: String,

    /// Documents to ground the plan in
    #[arg(short, long = "doc")]
    pub docs: Vec<PathBuf>,

    /// Extra notes passed to the model alongside the task
    #[arg(long)]
    pub context: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PlanCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing plan command");
        tracing::debug!("Plan options: {:?}", self);

        config.validate()?;

        let store = ingest(config, &self.docs).await?;

        let primary = PlanModel::new(
            create_client(&config.provider, &client_options(config, &config.provider))?,
            config.model.clone(),
        );
        let fallback = fallback_model(config)?;
        let prompts = PlanPrompts::load(&config.workspace)?;

        let generator = PlanGenerator::new(
            store.index().clone(),
            primary,
            fallback,
            prompts,
            PlanSettings::from_config(config),
        );
        let _sweeper = generator
            .cache()
            .spawn_sweeper(Duration::from_secs(config.cache.sweep_interval_secs.max(1)));

        let result = generator
            .plan_task(&self.task, self.context.clone())
            .await;

        if self.json {
            print_json(&result)
        } else {
            print_plan(&result);
            Ok(())
        }
    }
}

fn client_options(config: &AppConfig, provider: &str) -> ClientOptions {
    let provider_config = config.get_provider_config(provider);
    ClientOptions {
        endpoint: config.provider_endpoint(provider),
        api_key: config.resolve_api_key(provider),
        api_version: provider_config.and_then(|pc| pc.api_version.clone()),
        timeout: provider_config
            .and_then(|pc| pc.timeout)
            .map(Duration::from_secs),
    }
}

/// The service-level fallback, if a fallback provider or endpoint is set.
fn fallback_model(config: &AppConfig) -> AppResult<Option<PlanModel>> {
    let provider = match (&config.fallback_provider, &config.fallback_endpoint) {
        (Some(provider), _) => provider.clone(),
        (None, Some(_)) => DEFAULT_FALLBACK_PROVIDER.to_string(),
        (None, None) => return Ok(None),
    };

    let mut options = client_options(config, &provider);
    if let Some(ref endpoint) = config.fallback_endpoint {
        options.endpoint = Some(endpoint.clone());
    }

    tracing::debug!("Fallback provider: {} ({:?})", provider, options.endpoint);

    let client = create_client(&provider, &options)?;
    Ok(Some(PlanModel::new(client, config.provider_model(&provider))))
}

fn print_plan(result: &PlanResult) {
    if let Some(ref error) = result.error {
        eprintln!("Warning: {}", error);
    }

    for (i, step) in result.steps.iter().enumerate() {
        println!("{}. {}", i + 1, step);
    }

    println!();
    println!("Estimated time: {}", result.estimated_time);
    println!("Difficulty: {}", result.difficulty);
    if result.requires_approval {
        println!("Requires approval: yes");
    }
    println!(
        "Source: {}{} ({} relevant fragments)",
        result.strategy.as_str(),
        if result.cached { ", cached" } else { "" },
        result.relevant_chunks_count
    );
}
