//! LLM provider factory.
//!
//! Builds a generation service client from a provider name plus the
//! endpoint, key and timeout resolved from configuration.

use crate::client::LlmClient;
use crate::providers::{ClaudeClient, OllamaClient, OpenAiCompatibleClient};
use crate::types::ProviderType;
use std::sync::Arc;
use std::time::Duration;
use waypoint_core::{AppError, AppResult};

/// Connection options for a provider.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Base URL override
    pub endpoint: Option<String>,

    /// API key (required for Claude, optional for OpenAI-compatible servers)
    pub api_key: Option<String>,

    /// Anthropic API version header override
    pub api_version: Option<String>,

    /// Per-request timeout
    pub timeout: Option<Duration>,
}

/// Create an LLM client based on the provider name.
///
/// # Errors
/// Returns error if:
/// - Provider is unknown
/// - Required secrets are missing
/// - The HTTP client cannot be built
pub fn create_client(provider: &str, options: &ClientOptions) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;

    if provider_type.requires_api_key() && options.api_key.is_none() {
        return Err(AppError::Config(format!(
            "{} provider requires API key",
            provider_type.as_str()
        )));
    }

    tracing::debug!(
        "Creating {} client (endpoint: {:?})",
        provider_type.as_str(),
        options.endpoint
    );

    let client: Arc<dyn LlmClient> = match provider_type {
        ProviderType::Ollama => {
            let base_url = options.endpoint.as_deref().unwrap_or("http://localhost:11434");
            let mut client = OllamaClient::with_base_url(base_url);
            if let Some(timeout) = options.timeout {
                client = client.with_timeout(timeout)?;
            }
            Arc::new(client)
        }
        ProviderType::OpenAI => {
            let base_url = options.endpoint.as_deref().unwrap_or("https://api.openai.com");
            let mut client = OpenAiCompatibleClient::with_base_url(base_url, options.api_key.clone());
            if let Some(timeout) = options.timeout {
                client = client.with_timeout(timeout)?;
            }
            Arc::new(client)
        }
        ProviderType::Claude => {
            let base_url = options.endpoint.as_deref().unwrap_or("https://api.anthropic.com");
            let api_key = options.api_key.clone().unwrap_or_default();
            let mut client = ClaudeClient::with_base_url(base_url, api_key);
            if let Some(ref version) = options.api_version {
                client = client.with_api_version(version.clone());
            }
            if let Some(timeout) = options.timeout {
                client = client.with_timeout(timeout)?;
            }
            Arc::new(client)
        }
    };

    Ok(client)
}
