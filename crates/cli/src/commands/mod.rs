//! Command handlers for the Waypoint CLI.
//!
//! Nothing persists between runs, so commands that need an index build a
//! fresh one from the documents they are given.

pub mod chunk;
pub mod extract;
pub mod plan;
pub mod search;

pub use chunk::ChunkCommand;
pub use extract::ExtractCommand;
pub use plan::PlanCommand;
pub use search::SearchCommand;

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use waypoint_core::{config::AppConfig, AppError, AppResult};
use waypoint_knowledge::{
    create_embedder, load_document, ChunkOptions, KnowledgeStore, VectorIndex,
};

/// Load, chunk and index every document into a new store.
pub(crate) async fn ingest(config: &AppConfig, paths: &[PathBuf]) -> AppResult<KnowledgeStore> {
    let embedder = create_embedder(&config.retrieval)?;
    tracing::debug!(
        "Embedding with {} ({}, {} dimensions)",
        embedder.provider_name(),
        embedder.model_name(),
        embedder.dimensions()
    );

    let index = Arc::new(VectorIndex::new(embedder));
    let store = KnowledgeStore::new(index, chunk_options(config));

    for path in paths {
        let loaded = load_document(path)?;
        store
            .add_document(&loaded.name, &loaded.text, loaded.format)
            .await?;
    }

    tracing::info!(
        "Indexed {} documents ({} fragments)",
        store.list_documents().len(),
        store.index().len()
    );

    Ok(store)
}

pub(crate) fn chunk_options(config: &AppConfig) -> ChunkOptions {
    ChunkOptions {
        max_chunk_size: config.retrieval.chunk_size,
        overlap: config.retrieval.chunk_overlap,
    }
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Other(format!("Failed to serialize output: {}", e)))?;
    println!("{}", json);
    Ok(())
}
