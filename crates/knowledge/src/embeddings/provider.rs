//! Embedder trait and factory.

use crate::types::Vector;
use std::sync::Arc;
use waypoint_core::config::RetrievalSettings;
use waypoint_core::{AppError, AppResult};

/// Maps text to a fixed-length vector comparable by cosine similarity.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "char-bag", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Length of every vector this embedder returns.
    fn dimensions(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> AppResult<Vector>;

    /// Embed several texts, in order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vector>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Create an embedder from retrieval settings.
pub fn create_embedder(settings: &RetrievalSettings) -> AppResult<Arc<dyn Embedder>> {
    match settings.embedder.as_str() {
        "char-bag" => Ok(Arc::new(super::CharBagEmbedder::new(
            settings.dimensions,
        )?)),

        "ollama" => {
            let mut embedder = super::OllamaEmbedder::new(
                settings
                    .embedding_model
                    .clone()
                    .unwrap_or_else(|| super::providers::ollama::DEFAULT_MODEL.to_string()),
                settings.dimensions,
            )?;
            if let Some(ref endpoint) = settings.embedding_endpoint {
                embedder = embedder.with_base_url(endpoint);
            }
            Ok(Arc::new(embedder))
        }

        other => Err(AppError::Config(format!(
            "Unknown embedder: '{}'. Supported embedders: char-bag, ollama",
            other
        ))),
    }
}
