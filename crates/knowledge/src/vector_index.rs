//! In-memory vector index over document fragments.
//!
//! Fragments and their vectors live behind a single mutex so the ordered
//! fragment list and the id-to-vector map are always updated together.
//! Search is a linear cosine scan, O(N·D) per query: fine for the hundreds of
//! fragments a handful of manuals produce, not for large corpora.

use crate::embeddings::Embedder;
use crate::types::{Fragment, Vector};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use waypoint_core::{AppError, AppResult};

/// A search hit with its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredFragment {
    pub fragment: Fragment,
    pub score: f32,
}

#[derive(Debug, Default)]
struct IndexState {
    /// Insertion-ordered fragments; re-added ids appear more than once
    fragments: Vec<Fragment>,
    vectors: HashMap<String, Vector>,
}

/// Fragment store answering top-k cosine similarity queries.
#[derive(Debug)]
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    state: Mutex<IndexState>,
}

impl VectorIndex {
    /// Create an empty index whose vectors come from `embedder`.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            state: Mutex::new(IndexState::default()),
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    fn state(&self) -> MutexGuard<'_, IndexState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append fragments, embedding any whose id has no vector yet.
    ///
    /// Fragments are not deduplicated by id. Nothing is added if any
    /// embedding fails or comes back with the wrong dimensionality.
    pub async fn add(&self, fragments: Vec<Fragment>) -> AppResult<usize> {
        if fragments.is_empty() {
            return Ok(0);
        }

        let missing: Vec<&Fragment> = {
            let state = self.state();
            let mut pending = HashSet::new();
            fragments
                .iter()
                .filter(|f| !state.vectors.contains_key(&f.id) && pending.insert(f.id.as_str()))
                .collect()
        };

        let texts: Vec<String> = missing.iter().map(|f| f.content.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        if vectors.len() != missing.len() {
            return Err(AppError::Knowledge(format!(
                "Embedder returned {} vectors for {} fragments",
                vectors.len(),
                missing.len()
            )));
        }

        let dimensions = self.embedder.dimensions();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
            return Err(AppError::Knowledge(format!(
                "Embedding has {} dimensions, index expects {}",
                bad.len(),
                dimensions
            )));
        }

        let new_vectors: Vec<(String, Vector)> = missing
            .iter()
            .map(|f| f.id.clone())
            .zip(vectors)
            .collect();

        let added = fragments.len();
        let mut state = self.state();
        state.vectors.extend(new_vectors);
        state.fragments.extend(fragments);

        tracing::debug!(
            "Indexed {} fragments ({} total)",
            added,
            state.fragments.len()
        );

        Ok(added)
    }

    /// Top `k` fragments most similar to `query`, best first.
    pub async fn search(&self, query: &str, k: usize) -> AppResult<Vec<Fragment>> {
        Ok(self
            .search_scored(query, k)
            .await?
            .into_iter()
            .map(|hit| hit.fragment)
            .collect())
    }

    /// Like `search`, keeping each hit's similarity score.
    ///
    /// Equal scores keep insertion order. An empty index yields no hits.
    pub async fn search_scored(&self, query: &str, k: usize) -> AppResult<Vec<ScoredFragment>> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;

        let state = self.state();
        let mut results: Vec<ScoredFragment> = state
            .fragments
            .iter()
            .map(|fragment| {
                let score = state
                    .vectors
                    .get(&fragment.id)
                    .map_or(0.0, |v| cosine_similarity(&query_vector, v));
                ScoredFragment {
                    fragment: fragment.clone(),
                    score,
                }
            })
            .collect();
        drop(state);

        // sort_by is stable, so ties keep insertion order
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);

        tracing::debug!(
            "Retrieved {} fragments (requested top-{}, best score {:.3})",
            results.len(),
            k,
            results.first().map_or(0.0, |hit| hit.score)
        );

        Ok(results)
    }

    /// All fragments of one document, in insertion order.
    pub fn get_by_document(&self, document_id: &str) -> Vec<Fragment> {
        self.state()
            .fragments
            .iter()
            .filter(|f| f.document_id == document_id)
            .cloned()
            .collect()
    }

    /// Drop every fragment of a document along with its vectors.
    ///
    /// Returns how many fragment entries were removed.
    pub fn remove_document(&self, document_id: &str) -> usize {
        let mut state = self.state();
        let before = state.fragments.len();

        let mut removed_ids = HashSet::new();
        state.fragments.retain(|f| {
            if f.document_id == document_id {
                removed_ids.insert(f.id.clone());
                false
            } else {
                true
            }
        });
        state.vectors.retain(|id, _| !removed_ids.contains(id));

        before - state.fragments.len()
    }

    /// Remove all fragments and vectors.
    pub fn clear(&self) {
        let mut state = self.state();
        state.fragments.clear();
        state.vectors.clear();
    }

    /// Number of fragment entries.
    pub fn len(&self) -> usize {
        self.state().fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().fragments.is_empty()
    }
}

/// Cosine similarity of two vectors; 0 when either has zero norm or the
/// lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharBagEmbedder;

    fn index() -> VectorIndex {
        VectorIndex::new(Arc::new(CharBagEmbedder::default()))
    }

    fn fragment(content: &str, document_id: &str, index: u32) -> Fragment {
        Fragment::new(content, document_id, format!("{}.txt", document_id), index)
    }

    /// Embedder that always returns a vector of the wrong length.
    #[derive(Debug)]
    struct ShortEmbedder;

    #[async_trait::async_trait]
    impl Embedder for ShortEmbedder {
        fn provider_name(&self) -> &str {
            "short"
        }

        fn model_name(&self) -> &str {
            "short"
        }

        fn dimensions(&self) -> usize {
            4
        }

        async fn embed(&self, _text: &str) -> AppResult<Vector> {
            Ok(vec![1.0])
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![1.0, 0.0];
        let d = vec![0.0, 1.0];
        assert!((cosine_similarity(&c, &d) - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_is_symmetric() {
        let embedder = CharBagEmbedder::default();
        let a = embedder.vectorize("Open the File menu");
        let b = embedder.vectorize("Choose Save As");
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_similarity_zero_norm() {
        let zero = vec![0.0, 0.0];
        let other = vec![0.3, 0.4];
        assert_eq!(cosine_similarity(&zero, &other), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[tokio::test]
    async fn test_empty_index_search() {
        let index = index();
        assert!(index.search("anything", 5).await.unwrap().is_empty());
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_search_picks_closest_fragment() {
        let index = index();
        let a = fragment("Press Ctrl+S to save the file", "a", 0);
        let b = fragment("Print the quarterly report", "b", 0);
        index.add(vec![a.clone(), b.clone()]).await.unwrap();

        let embedder = CharBagEmbedder::default();
        let query = embedder.vectorize("save file");
        let score_a = cosine_similarity(&query, &embedder.vectorize(&a.content));
        let score_b = cosine_similarity(&query, &embedder.vectorize(&b.content));
        let expected = if score_a >= score_b { &a } else { &b };

        let hits = index.search("save file", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(&hits[0], expected);
    }

    #[tokio::test]
    async fn test_search_bounds_and_order() {
        let index = index();
        let texts = [
            "Open the settings dialog",
            "Click the Export button",
            "Select PDF as the format",
            "Confirm with OK",
            "Close the application",
        ];
        let fragments: Vec<Fragment> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| fragment(t, "manual", i as u32))
            .collect();
        let ids: HashSet<String> = fragments.iter().map(|f| f.id.clone()).collect();
        index.add(fragments).await.unwrap();

        let hits = index.search_scored("export to pdf", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(hits.iter().all(|h| ids.contains(&h.fragment.id)));

        let all = index.search("export to pdf", 50).await.unwrap();
        assert_eq!(all.len(), 5);
        assert!(index.search("export", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let index = index();
        let first = fragment("same text", "a", 0);
        let second = fragment("same text", "b", 0);
        index
            .add(vec![first.clone(), second.clone()])
            .await
            .unwrap();

        let hits = index.search("same text", 2).await.unwrap();
        assert_eq!(hits, vec![first, second]);
    }

    #[tokio::test]
    async fn test_readding_duplicates_entries() {
        let index = index();
        let f = fragment("Click Save", "a", 0);
        index.add(vec![f.clone()]).await.unwrap();
        index.add(vec![f.clone()]).await.unwrap();

        assert_eq!(index.len(), 2);
        let hits = index.search("Click Save", 5).await.unwrap();
        assert_eq!(hits, vec![f.clone(), f]);
    }

    #[tokio::test]
    async fn test_get_by_document_preserves_order() {
        let index = index();
        index
            .add(vec![
                fragment("a0", "a", 0),
                fragment("b0", "b", 0),
                fragment("a1", "a", 1),
            ])
            .await
            .unwrap();

        let contents: Vec<String> = index
            .get_by_document("a")
            .into_iter()
            .map(|f| f.content)
            .collect();
        assert_eq!(contents, vec!["a0", "a1"]);
        assert!(index.get_by_document("missing").is_empty());
    }

    #[tokio::test]
    async fn test_remove_document() {
        let index = index();
        index
            .add(vec![
                fragment("keep me", "a", 0),
                fragment("drop me", "b", 0),
                fragment("drop me too", "b", 1),
            ])
            .await
            .unwrap();

        assert_eq!(index.remove_document("b"), 2);
        assert_eq!(index.len(), 1);
        let hits = index.search("drop me", 10).await.unwrap();
        assert!(hits.iter().all(|f| f.document_id == "a"));
        assert_eq!(index.remove_document("b"), 0);
    }

    #[tokio::test]
    async fn test_clear() {
        let index = index();
        index.add(vec![fragment("text", "a", 0)]).await.unwrap();
        index.clear();

        assert!(index.is_empty());
        assert!(index.search("text", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_adds_nothing() {
        let index = VectorIndex::new(Arc::new(ShortEmbedder));
        let err = index.add(vec![fragment("text", "a", 0)]).await.unwrap_err();

        assert!(matches!(err, AppError::Knowledge(_)));
        assert!(index.is_empty());
    }
}
