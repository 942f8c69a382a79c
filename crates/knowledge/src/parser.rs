//! Reading uploaded documents from disk.

use crate::types::DocumentFormat;
use std::fs;
use std::path::Path;
use waypoint_core::{AppError, AppResult};

/// Block-level tags that end a line of text when stripping HTML.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "section", "article",
    "header", "footer", "ul", "ol", "table", "pre", "blockquote",
];

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    Html,
    PlainText,
}

impl ContentType {
    /// Detect content type from file extension. Unknown extensions are
    /// treated as plain text.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("md") | Some("markdown") => Self::Markdown,
            Some("html") | Some("htm") => Self::Html,
            _ => Self::PlainText,
        }
    }

    /// Chunking mode for text of this type.
    pub fn document_format(&self) -> DocumentFormat {
        match self {
            Self::Markdown => DocumentFormat::Markdown,
            Self::Html | Self::PlainText => DocumentFormat::Plain,
        }
    }
}

/// A document read from disk, ready to be added to a knowledge store.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    /// File name, used as the document name
    pub name: String,
    pub text: String,
    pub format: DocumentFormat,
}

/// Read a file and extract its text.
///
/// Markdown is kept verbatim so headings survive for section chunking. HTML
/// is reduced to its visible text, one line per block element. Files that
/// contain NUL bytes or are not UTF-8 are rejected as binary.
pub fn load_document(path: &Path) -> AppResult<LoadedDocument> {
    let bytes = fs::read(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))?;

    if !is_likely_text(&bytes) {
        tracing::warn!("Skipping likely binary file: {:?}", path);
        return Err(AppError::Knowledge(format!(
            "Binary file not supported: {:?}",
            path
        )));
    }

    let raw = String::from_utf8(bytes).map_err(|_| {
        AppError::Knowledge(format!("File is not valid UTF-8 text: {:?}", path))
    })?;

    let content_type = ContentType::from_path(path);
    let text = match content_type {
        ContentType::Html => clean_html(&raw),
        ContentType::Markdown | ContentType::PlainText => raw,
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    tracing::debug!(
        "Loaded '{}' ({:?}, {} bytes of text)",
        name,
        content_type,
        text.len()
    );

    Ok(LoadedDocument {
        name,
        text,
        format: content_type.document_format(),
    })
}

/// Strip tags, scripts and styles, keeping one line per block element.
fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut skip_until: Option<&str> = None;
    let mut rest = text;

    while let Some(open) = rest.find('<') {
        if skip_until.is_none() {
            result.push_str(&rest[..open]);
        }

        let tag_start = &rest[open..];
        let Some(close) = tag_start.find('>') else {
            rest = "";
            break;
        };
        let tag = &tag_start[1..close];
        rest = &tag_start[close + 1..];

        let closing = tag.starts_with('/');
        let name: String = tag
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match skip_until {
            Some(end) => {
                if closing && name == end {
                    skip_until = None;
                }
            }
            None => {
                if !closing && (name == "script" || name == "style") {
                    skip_until = Some(if name == "script" { "script" } else { "style" });
                } else if BLOCK_TAGS.contains(&name.as_str()) {
                    result.push('\n');
                }
            }
        }
    }

    if skip_until.is_none() {
        result.push_str(rest);
    }

    decode_entities(&result)
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Check if bytes are likely text (not binary).
fn is_likely_text(data: &[u8]) -> bool {
    !data.contains(&0)
}
