//! Plan generation: retrieval, prompting, reply parsing and the fallback
//! chain.

pub mod generator;
pub mod parse;
pub mod stages;
pub mod types;

pub use generator::{PlanGenerator, PlanPrompts, PlanSettings};
pub use stages::{
    AbsoluteStage, GenerationOptions, GenerationStage, HeuristicStage, PlanModel, PlanStage,
    StageInput, StageOutcome,
};
pub use types::{PlanDraft, PlanRequest, PlanResult, PlanStrategy, SubTask};
