//! Generation, progress and download handlers.

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use presently_models::{GenerateRequest, GenerateResponse, JobId, ProgressResponse};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Accept a URL and start a generation job.
///
/// Returns `202 Accepted` with the job id as soon as the record exists; the
/// pipeline runs on its own task.
pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let url = request.validated_url()?;

    let handle = state.registry.create(url.as_str()).await;
    let job_id = handle.id().clone();
    presently_pipeline::metrics::record_job_accepted();
    info!(job_id = %job_id, url = %url, "Generation job accepted");

    state.runner.spawn(handle);

    Ok((StatusCode::ACCEPTED, Json(GenerateResponse { job_id })))
}

/// Report a job's current status.
pub async fn get_progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<ProgressResponse>> {
    let job_id = JobId::from_string(job_id);
    let record = state
        .registry
        .get(&job_id)
        .await
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    Ok(Json(ProgressResponse::from(&record)))
}

/// Stream a completed job's output file as an attachment.
///
/// Only file names recorded on completed jobs resolve.
pub async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    let path = state
        .registry
        .resolve_artifact(&filename)
        .await
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(file = %path.display(), "Recorded output missing from disk");
            return Err(ApiError::not_found("File not found"));
        }
        Err(e) => return Err(e.into()),
    };
    let content_length = file.metadata().await?.len();

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&filename))
        .header(header::CONTENT_LENGTH, content_length)
        .header(header::CONTENT_DISPOSITION, content_disposition(&filename))
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(response)
}

fn content_type_for(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    if lower.ends_with(".mp4") {
        "video/mp4"
    } else if lower.ends_with(".pptx") {
        "application/vnd.openxmlformats-officedocument.presentationml.presentation"
    } else {
        "application/octet-stream"
    }
}

fn content_disposition(filename: &str) -> String {
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        filename.replace('"', ""),
        urlencoding::encode(filename)
    )
}
