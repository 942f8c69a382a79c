//! Generation service crate for Waypoint.
//!
//! This crate provides a provider-agnostic abstraction for calling Large
//! Language Models. Orchestration code depends only on the `LlmClient` trait;
//! providers are chosen at runtime through the factory.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenAI-compatible**: any `/v1/chat/completions` endpoint
//! - **Claude**: Anthropic Messages API
//!
//! # Example
//! ```no_run
//! use waypoint_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("How do I export a report?", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{
    is_model_unavailable, LlmClient, LlmMessage, LlmRequest, LlmResponse, LlmRole, LlmUsage,
};
pub use factory::{create_client, ClientOptions};
pub use providers::{ClaudeClient, OllamaClient, OpenAiCompatibleClient};
pub use types::ProviderType;
