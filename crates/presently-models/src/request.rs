//! HTTP request and response payloads.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{ModelError, ModelResult};
use crate::job::{ErrorKind, JobId, JobRecord, JobStatus};

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, JsonSchema)]
pub struct GenerateRequest {
    #[serde(default)]
    #[validate(length(max = 2048, message = "URL is too long"))]
    pub url: Option<String>,
}

impl GenerateRequest {
    /// Validate the request and return the trimmed source URL.
    ///
    /// Only absolute `http`/`https` URLs with a host are accepted.
    pub fn validated_url(&self) -> ModelResult<String> {
        let raw = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ModelError::validation("URL is required"))?;

        self.validate()
            .map_err(|e| ModelError::validation(e.to_string()))?;

        let parsed = url::Url::parse(raw)
            .map_err(|e| ModelError::validation(format!("Invalid URL: {}", e)))?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ModelError::validation(format!(
                    "Unsupported URL scheme '{}'",
                    other
                )))
            }
        }

        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(ModelError::validation("URL must include a host"));
        }

        Ok(raw.to_string())
    }
}

/// Body of the `202 Accepted` response.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerateResponse {
    pub job_id: JobId,
}

/// Read-only projection of a job returned to polling clients.
///
/// Absent fields serialize as `null` so clients always see the same keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressResponse {
    pub status: JobStatus,
    pub progress: u8,
    pub step: u8,
    pub message: String,
    pub video_path: Option<String>,
    pub ppt_path: Option<String>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl From<&JobRecord> for ProgressResponse {
    fn from(job: &JobRecord) -> Self {
        Self {
            status: job.status,
            progress: job.progress,
            step: job.step,
            message: job.message.clone(),
            video_path: job.video_path.clone(),
            ppt_path: job.ppt_path.clone(),
            error: job.error.clone(),
            error_kind: job.error_kind,
        }
    }
}
