//! Document registry in front of the vector index.

use crate::chunker::{chunk_markdown, chunk_text};
use crate::types::{ChunkOptions, Document, DocumentFormat, Fragment};
use crate::vector_index::VectorIndex;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use waypoint_core::{AppError, AppResult};

/// Uploaded documents and their indexed fragments.
///
/// Owns no global state: create one per process or per test.
#[derive(Debug)]
pub struct KnowledgeStore {
    index: Arc<VectorIndex>,
    documents: Mutex<Vec<Document>>,
    chunk_options: ChunkOptions,
}

impl KnowledgeStore {
    pub fn new(index: Arc<VectorIndex>, chunk_options: ChunkOptions) -> Self {
        Self {
            index,
            documents: Mutex::new(Vec::new()),
            chunk_options,
        }
    }

    /// The index this store writes to, for handing to a planner.
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    fn documents(&self) -> MutexGuard<'_, Vec<Document>> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Chunk, embed and register a document.
    ///
    /// Uploading identical text under the same name returns the existing
    /// document untouched. Uploading new text under an existing name
    /// replaces the old document and its fragments.
    pub async fn add_document(
        &self,
        name: &str,
        text: &str,
        format: DocumentFormat,
    ) -> AppResult<Document> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput(
                "Document name must not be empty".to_string(),
            ));
        }
        if text.trim().is_empty() {
            return Err(AppError::InvalidInput(format!(
                "Document '{}' has no text",
                name
            )));
        }

        let content_hash = sha256_hex(text);

        let previous = self
            .documents()
            .iter()
            .find(|d| d.name == name)
            .cloned();

        if let Some(ref existing) = previous {
            if existing.content_hash == content_hash {
                tracing::info!("Document '{}' unchanged, skipping re-index", name);
                return Ok(existing.clone());
            }
        }

        let document_id = uuid::Uuid::new_v4().to_string();
        let fragments = match format {
            DocumentFormat::Markdown => chunk_markdown(text, &document_id, name),
            DocumentFormat::Plain => chunk_text(text, &document_id, name, self.chunk_options),
        };
        let fragment_count = fragments.len() as u32;

        self.index.add(fragments).await?;

        let document = Document {
            id: document_id,
            name: name.to_string(),
            format,
            content_hash,
            fragment_count,
            byte_count: text.len() as u64,
            added_at: Utc::now(),
        };

        // Another upload of this name may have finished while we were embedding
        let replaced: Vec<Document> = {
            let mut documents = self.documents();

            let identical = documents
                .iter()
                .find(|d| d.name == document.name && d.content_hash == document.content_hash)
                .cloned();
            if let Some(existing) = identical {
                drop(documents);
                self.index.remove_document(&document.id);
                tracing::info!("Document '{}' was indexed concurrently, keeping first copy", name);
                return Ok(existing);
            }

            let (replaced, kept) = documents
                .drain(..)
                .partition(|d: &Document| d.name == document.name);
            *documents = kept;
            documents.push(document.clone());
            replaced
        };

        for old in &replaced {
            let fragments = self.index.remove_document(&old.id);
            tracing::info!(
                "Replaced earlier version of '{}' ({} fragments dropped)",
                name,
                fragments
            );
        }

        tracing::info!(
            "Indexed document '{}' ({} fragments, {} mode)",
            document.name,
            fragment_count,
            format.as_str()
        );

        Ok(document)
    }

    /// Unregister a document and drop its fragments from the index.
    pub fn remove_document(&self, document_id: &str) -> Option<Document> {
        let removed = {
            let mut documents = self.documents();
            let position = documents.iter().position(|d| d.id == document_id)?;
            documents.remove(position)
        };

        let fragments = self.index.remove_document(document_id);
        tracing::info!(
            "Removed document '{}' and {} fragments",
            removed.name,
            fragments
        );

        Some(removed)
    }

    /// Documents in upload order.
    pub fn list_documents(&self) -> Vec<Document> {
        self.documents().clone()
    }

    pub fn get_document(&self, document_id: &str) -> Option<Document> {
        self.documents()
            .iter()
            .find(|d| d.id == document_id)
            .cloned()
    }

    /// Indexed fragments of a document, in order.
    pub fn fragments(&self, document_id: &str) -> Vec<Fragment> {
        self.index.get_by_document(document_id)
    }
}

fn sha256_hex(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}
