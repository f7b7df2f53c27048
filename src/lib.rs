//! trainforge · structured training content generation
//!
//! Turns a free-text topic into a course (weeks → lessons) or an interactive scenario
//! (scenes → choices), using a remote chat-completion model when available and a
//! deterministic local synthesizer otherwise. Attempts against stored content are
//! scored and rolled into per-content and per-learner statistics.

pub mod config;
pub mod domain;
pub mod error;
pub mod evaluate;
pub mod extract;
pub mod generate;
pub mod logic;
pub mod normalize;
pub mod remote;
pub mod stats;
pub mod store;
pub mod synth;
pub mod telemetry;
pub mod util;

pub use config::GeneratorConfig;
pub use domain::{
  Answer, AttemptSubmission, ContentKind, ContentTree, DetailLevel, GenerationRequest, Item, ItemKind, Section,
  StructuralParams,
};
pub use error::{GenerationError, ServiceError, StoreError};
pub use evaluate::{evaluate, EvaluationResult};
pub use generate::{GenerationPlan, Generator};
pub use logic::TrainingService;
pub use remote::{ChatCompletionClient, CompletionService};
pub use store::{ContentStore, InMemoryStore};
