//! Splitting document text into fragments.
//!
//! Plain text is accumulated line by line into fragments of at most
//! `max_chunk_size` characters (advisory: a single long line is never cut),
//! carrying the last `overlap / 10` words of each closed fragment into the
//! next one. Markdown is split into one fragment per heading-delimited
//! section with no size bound.

use crate::types::{ChunkOptions, Fragment};
use regex::Regex;
use std::sync::LazyLock;

/// Page break marker emitted by most PDF-to-text converters.
const PAGE_BREAK: char = '\u{000C}';

static HEADING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#+\s").expect("valid regex"));

/// Chunk plain text into overlapping, size-bounded fragments.
pub fn chunk_text(
    text: &str,
    document_id: &str,
    document_name: &str,
    options: ChunkOptions,
) -> Vec<Fragment> {
    let paginated = text.contains(PAGE_BREAK);
    let overlap_words = options.overlap / 10;

    let mut fragments = Vec::new();
    let mut buffer = String::new();
    let mut buffer_len = 0usize;
    let mut buffer_page = 1u32;
    let mut page = 1u32;

    for raw_line in text.split('\n') {
        let breaks = raw_line.matches(PAGE_BREAK).count() as u32;
        let line = raw_line.trim_matches(|c: char| c.is_whitespace() || c == PAGE_BREAK);
        let line_page = page + breaks;
        page = line_page;

        if line.is_empty() {
            continue;
        }

        let line_len = line.chars().count();

        if buffer_len > 0 && buffer_len + 1 + line_len > options.max_chunk_size {
            let seed = trailing_words(&buffer, overlap_words);
            push_fragment(
                &mut fragments,
                &buffer,
                document_id,
                document_name,
                paginated.then_some(buffer_page),
            );

            buffer.clear();
            if !seed.is_empty() {
                buffer.push_str(&seed);
                buffer.push(' ');
            }
            buffer.push_str(line);
            buffer_len = buffer.chars().count();
            buffer_page = line_page;
        } else {
            if buffer_len == 0 {
                buffer_page = line_page;
            } else {
                buffer.push('\n');
                buffer_len += 1;
            }
            buffer.push_str(line);
            buffer_len += line_len;
        }
    }

    if buffer_len > 0 {
        push_fragment(
            &mut fragments,
            &buffer,
            document_id,
            document_name,
            paginated.then_some(buffer_page),
        );
    }

    tracing::debug!(
        "Chunked '{}' into {} fragments (size: {}, overlap words: {})",
        document_name,
        fragments.len(),
        options.max_chunk_size,
        overlap_words
    );

    fragments
}

/// Chunk markdown into one fragment per heading-delimited section.
///
/// Text before the first heading forms its own section. Sections are never
/// size-bounded.
pub fn chunk_markdown(text: &str, document_id: &str, document_name: &str) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    let mut section: Vec<&str> = Vec::new();

    for line in text.lines() {
        if HEADING_REGEX.is_match(line) && !section.is_empty() {
            push_fragment(
                &mut fragments,
                &section.join("\n"),
                document_id,
                document_name,
                None,
            );
            section.clear();
        }
        section.push(line);
    }

    if !section.is_empty() {
        push_fragment(
            &mut fragments,
            &section.join("\n"),
            document_id,
            document_name,
            None,
        );
    }

    tracing::debug!(
        "Chunked markdown '{}' into {} sections",
        document_name,
        fragments.len()
    );

    fragments
}

fn push_fragment(
    fragments: &mut Vec<Fragment>,
    content: &str,
    document_id: &str,
    document_name: &str,
    page: Option<u32>,
) {
    let content = content.trim();
    if content.is_empty() {
        return;
    }
    let index = fragments.len() as u32;
    fragments.push(Fragment::new(content, document_id, document_name, index).with_page(page));
}

/// Last `count` whitespace-separated words of `text`, joined by single spaces.
fn trailing_words(text: &str, count: usize) -> String {
    if count == 0 {
        return String::new();
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    let start = words.len().saturating_sub(count);
    words[start..].join(" ")
}
