//! Embedder implementations.

pub mod char_bag;
pub mod ollama;

pub use char_bag::CharBagEmbedder;
pub use ollama::OllamaEmbedder;
