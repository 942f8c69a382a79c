//! Chunk command handler.

use super::{chunk_options, print_json};
use clap::Args;
use std::path::PathBuf;
use waypoint_core::{config::AppConfig, AppResult};
use waypoint_knowledge::{chunk_markdown, chunk_text, load_document, DocumentFormat};

/// Show how a document is split into fragments
#[derive(Args, Debug)]
pub struct ChunkCommand {
    /// Document to split
    pub path: PathBuf,

    /// Split on headings even if the file is not .md
    #[arg(long)]
    pub markdown: bool,

    /// Maximum fragment length in characters (plain mode)
    #[arg(long)]
    pub size: Option<usize>,

    /// Overlap budget in characters; every 10 carries one word forward
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ChunkCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chunk command");
        tracing::debug!("Chunk options: {:?}", self);

        let document = load_document(&self.path)?;

        let mut options = chunk_options(config);
        if let Some(size) = self.size {
            options.max_chunk_size = size;
        }
        if let Some(overlap) = self.overlap {
            options.overlap = overlap;
        }

        // Fragments are not indexed, so the name doubles as the id
        let document_id = document.name.clone();
        let fragments = if self.markdown || document.format == DocumentFormat::Markdown {
            chunk_markdown(&document.text, &document_id, &document.name)
        } else {
            chunk_text(&document.text, &document_id, &document.name, options)
        };

        if self.json {
            return print_json(&fragments);
        }

        for fragment in &fragments {
            match fragment.page {
                Some(page) => println!(
                    "--- #{} (page {}, {} chars)",
                    fragment.index,
                    page,
                    fragment.content.chars().count()
                ),
                None => println!(
                    "--- #{} ({} chars)",
                    fragment.index,
                    fragment.content.chars().count()
                ),
            }
            println!("{}", fragment.content);
        }

        Ok(())
    }
}
