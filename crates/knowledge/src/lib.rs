//! Retrieval-augmented planning.
//!
//! Documents are chunked into fragments, embedded into an in-memory vector
//! index and retrieved as context for a generation service that turns a
//! task into ordered steps. When the service is unavailable the planner
//! degrades to a second service, then to steps mined from the retrieved
//! text, then to a fixed generic plan.

pub mod cache;
pub mod chunker;
pub mod embeddings;
pub mod mining;
pub mod parser;
pub mod plan;
pub mod store;
pub mod types;
pub mod vector_index;

pub use cache::{cache_key, Cache, CacheStats};
pub use chunker::{chunk_markdown, chunk_text};
pub use embeddings::{create_embedder, CharBagEmbedder, Embedder, OllamaEmbedder};
pub use mining::{extract_steps, extract_ui_elements};
pub use parser::{load_document, ContentType, LoadedDocument};
pub use plan::{
    PlanDraft, PlanGenerator, PlanModel, PlanPrompts, PlanRequest, PlanResult, PlanSettings,
    PlanStrategy,
};
pub use store::KnowledgeStore;
pub use types::{ChunkOptions, Document, DocumentFormat, Fragment, UiElement, Vector};
pub use vector_index::{cosine_similarity, ScoredFragment, VectorIndex};
