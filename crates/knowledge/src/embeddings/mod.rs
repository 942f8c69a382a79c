//! Text embedding for the vector index.
//!
//! The index and planner only see the `Embedder` trait; which implementation
//! produces the vectors is a configuration choice.

pub mod provider;
pub mod providers;

pub use provider::{create_embedder, Embedder};
pub use providers::{CharBagEmbedder, OllamaEmbedder};
