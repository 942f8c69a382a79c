//! Prompt system for Waypoint.
//!
//! This crate provides structured prompt management with:
//! - Built-in plan prompts
//! - YAML overrides per workspace
//! - Handlebars template rendering

pub mod builder;
pub mod builtin;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use builtin::{builtin_prompt, plan_shape, PLAN_FALLBACK, PLAN_GENERATE};
pub use loader::{list_prompts, load_prompt};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptOutputSpec};
