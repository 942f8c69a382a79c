//! Extract command handler.

use super::print_json;
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use waypoint_core::AppResult;
use waypoint_knowledge::{extract_steps, extract_ui_elements, load_document};

/// What to mine from the document.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractKind {
    /// Step phrases ("Step 1:", circled numerals, numbered lists)
    Steps,
    /// On-screen targets (quoted labels, "Button: Save")
    Elements,
}

/// Mine steps or UI elements from a document
#[derive(Args, Debug)]
pub struct ExtractCommand {
    #[arg(value_enum)]
    pub kind: ExtractKind,

    /// Document to read
    pub path: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ExtractCommand {
    pub fn execute(&self) -> AppResult<()> {
        tracing::info!("Executing extract command");
        tracing::debug!("Extract options: {:?}", self);

        let document = load_document(&self.path)?;

        match self.kind {
            ExtractKind::Steps => {
                let steps = extract_steps(&document.text);
                tracing::debug!("Found {} steps in '{}'", steps.len(), document.name);
                if self.json {
                    return print_json(&steps);
                }
                for (i, step) in steps.iter().enumerate() {
                    println!("{}. {}", i + 1, step);
                }
            }
            ExtractKind::Elements => {
                let elements = extract_ui_elements(&document.text);
                tracing::debug!("Found {} elements in '{}'", elements.len(), document.name);
                if self.json {
                    return print_json(&elements);
                }
                for element in &elements {
                    println!("{}\t{}", element.element, element.description);
                }
            }
        }

        Ok(())
    }
}
