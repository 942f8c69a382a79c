//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fixed-length embedding vector.
pub type Vector = Vec<f32>;

/// A fragment of a document. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    /// Unique fragment identifier
    pub id: String,

    /// Text content
    pub content: String,

    /// Owning document id
    pub document_id: String,

    /// Owning document name
    pub document_name: String,

    /// Ordinal position within the document, starting at 0
    pub index: u32,

    /// Page the fragment starts on, for paginated sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl Fragment {
    pub fn new(
        content: impl Into<String>,
        document_id: impl Into<String>,
        document_name: impl Into<String>,
        index: u32,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            document_id: document_id.into(),
            document_name: document_name.into(),
            index,
            page: None,
        }
    }

    pub fn with_page(mut self, page: Option<u32>) -> Self {
        self.page = page;
        self
    }
}

/// How a document's text is split into fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Line-accumulating, size-bounded, overlapping fragments
    Plain,
    /// One fragment per heading-delimited section
    Markdown,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Markdown => "markdown",
        }
    }
}

/// Options for plain-text chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    /// Advisory maximum fragment length in characters
    pub max_chunk_size: usize,

    /// Overlap budget; `overlap / 10` trailing words are carried into the next fragment
    pub overlap: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: 500,
            overlap: 50,
        }
    }
}

/// A document registered in a knowledge store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Unique document identifier
    pub id: String,

    /// Display name (usually the uploaded file name)
    pub name: String,

    /// Chunking mode used for this document
    pub format: DocumentFormat,

    /// SHA-256 of the raw text, hex encoded
    pub content_hash: String,

    /// Number of fragments indexed for this document
    pub fragment_count: u32,

    /// Size of the raw text in bytes
    pub byte_count: u64,

    /// When the document was indexed
    pub added_at: DateTime<Utc>,
}

/// A UI element mentioned in instructional text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiElement {
    /// The element's label as written (e.g. "Save As")
    pub element: String,

    /// Where or how the element was mentioned
    pub description: String,
}
