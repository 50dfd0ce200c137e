//! Health check handlers.

use std::path::Path;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub work_dir: CheckStatus,
    pub ffmpeg: CheckStatus,
    pub soffice: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for CheckStatus {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(_) => CheckStatus::ok(),
            Err(e) => CheckStatus::error(e.to_string()),
        }
    }
}

/// Readiness check endpoint (readiness probe).
/// Checks the work directory is writable and the media tools are installed.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let work_dir = check_writable(&state.runner.config().work_dir).await.into();
    let ffmpeg = presently_media::check_ffmpeg().into();
    let soffice = presently_media::check_soffice().into();

    let checks = ReadinessChecks {
        work_dir,
        ffmpeg,
        soffice,
    };
    let all_ok = checks.work_dir.is_ok() && checks.ffmpeg.is_ok() && checks.soffice.is_ok();

    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks,
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

async fn check_writable(dir: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let probe = dir.join(".ready-probe");
    tokio::fs::write(&probe, b"ok").await?;
    tokio::fs::remove_file(&probe).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_check_writable() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("jobs");
        assert!(check_writable(&nested).await.is_ok());
        assert!(!nested.join(".ready-probe").exists());
    }

    #[test]
    fn test_check_status_from_result() {
        let ok: CheckStatus = Ok::<(), String>(()).into();
        assert!(ok.is_ok());

        let err: CheckStatus = Err::<(), _>("ffmpeg not found").into();
        assert_eq!(err.error.as_deref(), Some("ffmpeg not found"));
    }
}
