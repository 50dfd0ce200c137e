//! Pipeline error types.

use thiserror::Error;

use presently_models::{ErrorKind, ModelError, Stage};

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Scraping failed: {0}")]
    ScrapeFailed(String),

    #[error("AI generation failed: {0}")]
    AiFailed(String),

    #[error("Invalid presentation content: {0}")]
    InvalidDeck(String),

    #[error("Document creation failed: {0}")]
    DocumentFailed(String),

    #[error("Narration failed: {0}")]
    NarrationFailed(String),

    #[error("Rasterization failed: {0}")]
    RasterizeFailed(String),

    #[error("Video assembly failed: {0}")]
    AssemblyFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Pipeline panicked: {0}")]
    Panicked(String),

    #[error("Stage '{stage}' timed out after {secs} seconds")]
    StageTimeout { stage: Stage, secs: u64 },

    #[error("Job state error: {0}")]
    JobState(#[from] ModelError),

    #[error("Media error: {0}")]
    Media(#[from] presently_media::MediaError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn scrape_failed(msg: impl Into<String>) -> Self {
        Self::ScrapeFailed(msg.into())
    }

    pub fn ai_failed(msg: impl Into<String>) -> Self {
        Self::AiFailed(msg.into())
    }

    pub fn invalid_deck(msg: impl Into<String>) -> Self {
        Self::InvalidDeck(msg.into())
    }

    pub fn document_failed(msg: impl Into<String>) -> Self {
        Self::DocumentFailed(msg.into())
    }

    pub fn narration_failed(msg: impl Into<String>) -> Self {
        Self::NarrationFailed(msg.into())
    }

    pub fn rasterize_failed(msg: impl Into<String>) -> Self {
        Self::RasterizeFailed(msg.into())
    }

    pub fn assembly_failed(msg: impl Into<String>) -> Self {
        Self::AssemblyFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Terminal error classification recorded on the job.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::StageTimeout { .. } => ErrorKind::StageTimeout,
            PipelineError::Media(e) if e.is_timeout() => ErrorKind::StageTimeout,
            _ => ErrorKind::StageFailure,
        }
    }

    /// Check if error is worth another attempt of an idempotent stage.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::ScrapeFailed(_) | PipelineError::Io(_) => true,
            PipelineError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.status().map_or(true, |s| s.is_server_error())
            }
            _ => false,
        }
    }
}
