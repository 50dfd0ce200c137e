//! Job record and lifecycle transitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::stage::Stage;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, waiting for the pipeline to start
    #[default]
    Queued,
    /// Pipeline stages are executing
    Running,
    /// Video and slide document are ready
    Completed,
    /// A stage failed or timed out
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification of a terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A stage collaborator returned an error
    StageFailure,
    /// A stage exceeded its time budget
    StageTimeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::StageFailure => "stage_failure",
            ErrorKind::StageTimeout => "stage_timeout",
        }
    }
}

/// One generation request, from acceptance to its terminal status.
///
/// All mutation goes through the transition methods so the record's
/// invariants hold at every observable point:
/// - progress never decreases before a terminal status
/// - output paths are present only when completed
/// - error detail is present only on error
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    pub id: JobId,
    pub url: String,
    pub status: JobStatus,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Current stage index (0 before the first stage)
    pub step: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ppt_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Create a queued record for a URL.
    pub fn new(id: JobId, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            url: url.into(),
            status: JobStatus::Queued,
            progress: 0,
            step: 0,
            message: "Queued".to_string(),
            video_path: None,
            ppt_path: None,
            error: None,
            error_kind: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move from queued to running.
    pub fn start(&mut self) -> ModelResult<()> {
        if self.status != JobStatus::Queued {
            return Err(ModelError::invalid_transition(self.status, "start"));
        }
        self.status = JobStatus::Running;
        self.message = "Starting...".to_string();
        self.touch();
        Ok(())
    }

    /// Record entry into a stage.
    ///
    /// Progress is raised to the stage checkpoint but never lowered.
    pub fn enter_stage(&mut self, stage: Stage) -> ModelResult<()> {
        if self.status != JobStatus::Running {
            return Err(ModelError::invalid_transition(self.status, "advance"));
        }
        self.step = stage.index();
        self.progress = self.progress.max(stage.checkpoint());
        self.message = stage.message().to_string();
        self.touch();
        Ok(())
    }

    /// Mark the job completed with its two output references.
    pub fn complete(
        &mut self,
        video_path: impl Into<String>,
        ppt_path: impl Into<String>,
    ) -> ModelResult<()> {
        if self.status != JobStatus::Running {
            return Err(ModelError::invalid_transition(self.status, "complete"));
        }
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.message = "Generation successful!".to_string();
        self.video_path = Some(video_path.into());
        self.ppt_path = Some(ppt_path.into());
        self.finish();
        Ok(())
    }

    /// Mark the job failed. Progress is left at the last checkpoint.
    pub fn fail(&mut self, kind: ErrorKind, detail: impl Into<String>) -> ModelResult<()> {
        if self.is_terminal() {
            return Err(ModelError::invalid_transition(self.status, "fail"));
        }
        let mut detail = detail.into();
        if detail.trim().is_empty() {
            detail = "unknown error".to_string();
        }
        self.status = JobStatus::Error;
        self.message = format!("Error: {}", detail);
        self.error = Some(detail);
        self.error_kind = Some(kind);
        self.video_path = None;
        self.ppt_path = None;
        self.finish();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn finish(&mut self) {
        let now = Utc::now();
        self.updated_at = now;
        self.finished_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> JobRecord {
        let mut job = JobRecord::new(JobId::new(), "https://example.com");
        job.start().unwrap();
        job
    }

    #[test]
    fn test_new_record_is_queued() {
        let job = JobRecord::new(JobId::from_string("job-1"), "https://example.com");
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);
        assert_eq!(job.step, 0);
        assert_eq!(job.message, "Queued");
        assert!(job.video_path.is_none() && job.ppt_path.is_none() && job.error.is_none());
    }

    #[test]
    fn test_enter_stage_requires_running() {
        let mut job = JobRecord::new(JobId::new(), "https://example.com");
        assert_eq!(
            job.enter_stage(Stage::Extract),
            Err(ModelError::invalid_transition(JobStatus::Queued, "advance"))
        );
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut job = running();
        job.enter_stage(Stage::Narration).unwrap();
        assert_eq!(job.progress, 65);

        job.enter_stage(Stage::Extract).unwrap();
        assert_eq!(job.progress, 65);
        assert_eq!(job.step, 1);
    }

    #[test]
    fn test_complete_sets_outputs() {
        let mut job = running();
        job.enter_stage(Stage::Video).unwrap();
        job.complete("presentation_x.mp4", "presentation_x.pptx").unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.video_path.as_deref(), Some("presentation_x.mp4"));
        assert_eq!(job.ppt_path.as_deref(), Some("presentation_x.pptx"));
        assert!(job.error.is_none());
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_fail_keeps_checkpoint_and_clears_outputs() {
        let mut job = running();
        job.enter_stage(Stage::Extract).unwrap();
        job.fail(ErrorKind::StageFailure, "dns lookup failed").unwrap();

        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.progress, 10);
        assert_eq!(job.error.as_deref(), Some("dns lookup failed"));
        assert_eq!(job.message, "Error: dns lookup failed");
        assert_eq!(job.error_kind, Some(ErrorKind::StageFailure));
        assert!(job.video_path.is_none() && job.ppt_path.is_none());
    }

    #[test]
    fn test_fail_with_empty_detail_still_has_message() {
        let mut job = running();
        job.fail(ErrorKind::StageFailure, "  ").unwrap();
        assert_eq!(job.error.as_deref(), Some("unknown error"));
    }

    #[test]
    fn test_terminal_transitions_happen_once() {
        let mut job = running();
        job.complete("a.mp4", "a.pptx").unwrap();

        assert!(job.fail(ErrorKind::StageFailure, "late").is_err());
        assert!(job.complete("b.mp4", "b.pptx").is_err());
        assert!(job.enter_stage(Stage::Video).is_err());
        assert_eq!(job.video_path.as_deref(), Some("a.mp4"));
    }

    #[test]
    fn test_queued_job_can_fail_directly() {
        let mut job = JobRecord::new(JobId::new(), "https://example.com");
        job.fail(ErrorKind::StageFailure, "workspace unavailable").unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.progress, 0);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
        let json = serde_json::to_string(&ErrorKind::StageTimeout).unwrap();
        assert_eq!(json, "\"stage_timeout\"");
    }
}
