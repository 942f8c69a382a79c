//! Deterministic bag-of-characters embedder.
//!
//! Lowercases the text, counts each UTF-16 code unit into bucket
//! `unit % D`, then L2-normalizes. It captures lexical overlap only, which is
//! enough for small offline corpora and makes retrieval fully reproducible.

use crate::embeddings::provider::Embedder;
use crate::types::Vector;
use waypoint_core::{AppError, AppResult};

/// Default dimensionality.
pub const DEFAULT_DIMENSIONS: usize = 128;

/// Pure, stateless character-count embedder.
#[derive(Debug, Clone)]
pub struct CharBagEmbedder {
    dimensions: usize,
}

impl CharBagEmbedder {
    /// Create an embedder producing `dimensions`-long vectors.
    pub fn new(dimensions: usize) -> AppResult<Self> {
        if dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(Self { dimensions })
    }

    /// Compute the vector for `text`. Same input, same output.
    pub fn vectorize(&self, text: &str) -> Vector {
        let mut vector = vec![0.0f32; self.dimensions];

        for unit in text.to_lowercase().encode_utf16() {
            vector[unit as usize % self.dimensions] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in vector.iter_mut() {
                *value /= norm;
            }
        }

        vector
    }
}

impl Default for CharBagEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
        }
    }
}

#[async_trait::async_trait]
impl Embedder for CharBagEmbedder {
    fn provider_name(&self) -> &str {
        "char-bag"
    }

    fn model_name(&self) -> &str {
        "char-bag-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> AppResult<Vector> {
        Ok(self.vectorize(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_deterministic() {
        let embedder = CharBagEmbedder::default();
        assert_eq!(
            embedder.vectorize("Open the file menu"),
            embedder.vectorize("Open the file menu")
        );
    }

    #[test]
    fn test_case_insensitive() {
        let embedder = CharBagEmbedder::default();
        assert_eq!(embedder.vectorize("SAVE"), embedder.vectorize("save"));
    }

    #[test]
    fn test_distinct_texts_differ() {
        let embedder = CharBagEmbedder::default();
        assert_ne!(embedder.vectorize("save file"), embedder.vectorize("print"));
    }

    #[test]
    fn test_unit_length() {
        let embedder = CharBagEmbedder::default();
        let v = embedder.vectorize("Click Export, then choose PDF");
        assert_eq!(v.len(), DEFAULT_DIMENSIONS);
        assert!((norm(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = CharBagEmbedder::new(16).unwrap();
        let v = embedder.vectorize("");
        assert_eq!(v, vec![0.0; 16]);
    }

    #[test]
    fn test_bucket_is_code_unit_modulo_dimensions() {
        // 'a' = 97, 97 % 8 = 1
        let embedder = CharBagEmbedder::new(8).unwrap();
        let v = embedder.vectorize("aa");
        assert_eq!(v[1], 1.0);
        assert_eq!(v.iter().filter(|x| **x != 0.0).count(), 1);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(CharBagEmbedder::new(0).is_err());
    }

    #[tokio::test]
    async fn test_trait_embed_matches_vectorize() {
        let embedder = CharBagEmbedder::default();
        let via_trait = embedder.embed("Settings").await.unwrap();
        assert_eq!(via_trait, embedder.vectorize("Settings"));
        assert_eq!(embedder.dimensions(), DEFAULT_DIMENSIONS);
    }
}
