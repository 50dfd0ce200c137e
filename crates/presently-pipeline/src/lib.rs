//! URL-to-video generation pipeline.
//!
//! This crate provides:
//! - The in-memory job registry with retention/eviction
//! - The stage runner that drives one job through the six fixed stages
//! - Per-job isolated workspaces
//! - Stage collaborators (scraper, Gemini content generation, slide document,
//!   music, narration, rasterization, video assembly)
//! - Retry and structured job logging

pub mod collaborators;
pub mod config;
pub mod deck;
pub mod error;
pub mod gemini;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod retry;
pub mod runner;
pub mod workspace;

pub use collaborators::Collaborators;
pub use config::PipelineConfig;
pub use deck::{Deck, Page, Slide};
pub use error::{PipelineError, PipelineResult};
pub use gemini::GeminiClient;
pub use logging::JobLogger;
pub use registry::{JobHandle, JobOutputs, JobRegistry, RetentionPolicy};
pub use runner::StageRunner;
pub use workspace::JobWorkspace;
