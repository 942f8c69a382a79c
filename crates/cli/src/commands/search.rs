//! Search command handler.

use super::{ingest, print_json};
use clap::Args;
use std::path::PathBuf;
use waypoint_core::{config::AppConfig, AppResult};

/// Show the fragments most similar to a query
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Text to search for
    pub query: String,

    /// Documents to search
    #[arg(short, long = "doc", required = true)]
    pub docs: Vec<PathBuf>,

    /// Number of fragments to return (default: retrieval.topK)
    #[arg(short)]
    pub k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command");
        tracing::debug!("Search options: {:?}", self);

        let store = ingest(config, &self.docs).await?;
        let k = self.k.unwrap_or(config.retrieval.top_k);
        let hits = store.index().search_scored(&self.query, k).await?;

        if self.json {
            return print_json(&hits);
        }

        if hits.is_empty() {
            println!("No fragments indexed.");
        }

        for hit in &hits {
            println!(
                "[{:.3}] {} #{}",
                hit.score, hit.fragment.document_name, hit.fragment.index
            );
            println!("{}", hit.fragment.content);
            println!();
        }

        Ok(())
    }
}
