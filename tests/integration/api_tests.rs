//! API integration tests.
//!
//! Drive the whole router with stub collaborators standing in for the
//! scraper, Gemini, Text-to-Speech, LibreOffice and FFmpeg.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use presently_api::{create_router, ApiConfig, AppState};
use presently_pipeline::collaborators::{
    ContentGenerator, ContentSection, DocumentBuilder, MusicSelector, Narrator, Rasterizer,
    ScrapeOutput, Scraper, VideoAssembler,
};
use presently_pipeline::{
    Collaborators, JobRegistry, PipelineConfig, PipelineError, PipelineResult, StageRunner,
};

const DECK: &str = "# Example\n> Welcome.\n## First\n- one\n- two\n> First slide.\n";
const VIDEO_BYTES: &[u8] = b"fake mp4 payload";

struct StubScraper;

#[async_trait]
impl Scraper for StubScraper {
    async fn scrape(&self, url: &str, workspace_root: &Path) -> PipelineResult<ScrapeOutput> {
        if url.contains(".invalid") {
            return Err(PipelineError::scrape_failed(format!("cannot resolve {}", url)));
        }
        let markdown_path = workspace_root.join("source.md");
        tokio::fs::write(&markdown_path, "# Example\n\nBody text.").await?;
        Ok(ScrapeOutput {
            raw_html: "<p>Body text.</p>".into(),
            sections: vec![ContentSection::default()],
            image_paths: Vec::new(),
            markdown_path,
            workspace_root: workspace_root.to_path_buf(),
            canonical_url: url.to_string(),
        })
    }
}

/// Scraper that stalls long enough to outlive any reasonable request.
struct SlowScraper;

#[async_trait]
impl Scraper for SlowScraper {
    async fn scrape(&self, url: &str, _: &Path) -> PipelineResult<ScrapeOutput> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Err(PipelineError::scrape_failed(format!("gave up on {}", url)))
    }
}

struct StubContent;

#[async_trait]
impl ContentGenerator for StubContent {
    async fn generate(&self, _: &Path) -> PipelineResult<String> {
        Ok(DECK.to_string())
    }
}

struct StubDocument;

#[async_trait]
impl DocumentBuilder for StubDocument {
    async fn build(&self, _: &Path, output_file: &Path) -> PipelineResult<()> {
        tokio::fs::write(output_file, b"PK").await?;
        Ok(())
    }
}

struct StubMusic;

#[async_trait]
impl MusicSelector for StubMusic {
    async fn select(&self, _: &Path, _: &str) -> PipelineResult<Option<PathBuf>> {
        Ok(None)
    }
}

struct StubNarrator;

#[async_trait]
impl Narrator for StubNarrator {
    async fn narrate(&self, _: &str, audio_dir: &Path) -> PipelineResult<Vec<PathBuf>> {
        let path = audio_dir.join("slide_1.mp3");
        tokio::fs::write(&path, b"ID3").await?;
        Ok(vec![path])
    }
}

struct StubRasterizer;

#[async_trait]
impl Rasterizer for StubRasterizer {
    async fn rasterize(&self, workspace_root: &Path) -> PipelineResult<Vec<PathBuf>> {
        let dir = workspace_root.join("slide_images");
        tokio::fs::create_dir_all(&dir).await?;
        let page = dir.join("slide-1.png");
        tokio::fs::write(&page, b"png").await?;
        Ok(vec![page])
    }
}

struct StubAssembler;

#[async_trait]
impl VideoAssembler for StubAssembler {
    async fn assemble(&self, workspace_root: &Path) -> PipelineResult<PathBuf> {
        let path = workspace_root.join("presentation_video.mp4");
        tokio::fs::write(&path, VIDEO_BYTES).await?;
        Ok(path)
    }
}

fn create_test_router(work_dir: &Path) -> Router {
    create_test_router_with(work_dir, Arc::new(StubScraper))
}

fn create_test_router_with(work_dir: &Path, scraper: Arc<dyn Scraper>) -> Router {
    let collaborators = Collaborators {
        scraper,
        content: Arc::new(StubContent),
        document: Arc::new(StubDocument),
        music: Arc::new(StubMusic),
        narrator: Arc::new(StubNarrator),
        rasterizer: Arc::new(StubRasterizer),
        assembler: Arc::new(StubAssembler),
    };
    let pipeline = PipelineConfig {
        work_dir: work_dir.to_path_buf(),
        stage_timeout: Duration::from_secs(5),
        scrape_retry_delay: Duration::from_millis(1),
        ..Default::default()
    };
    let config = ApiConfig {
        rate_limit_rps: 1000,
        ..Default::default()
    };

    let state = AppState::from_parts(
        config,
        JobRegistry::default(),
        StageRunner::new(collaborators, pipeline),
    );
    create_router(state, None)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn generate_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn submit(app: &Router, url: &str) -> String {
    let response = app
        .clone()
        .oneshot(generate_request(json!({ "url": url })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = body_json(response).await;
    body["job_id"].as_str().unwrap().to_string()
}

/// Poll until the job reaches a terminal status.
async fn wait_for_terminal(app: &Router, job_id: &str) -> Value {
    for _ in 0..200 {
        let response = app
            .clone()
            .oneshot(get(&format!("/api/progress/{}", job_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        if body["status"] == "completed" || body["status"] == "error" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {} did not finish", job_id);
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_router(dir.path());

    for path in ["/health", "/healthz"] {
        let response = app.clone().oneshot(get(path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );

        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
    }
}

#[tokio::test]
async fn test_metrics_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_router(dir.path());

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_generate_requires_url() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_router(dir.path());

    for body in [json!({}), json!({ "url": "" }), json!({ "url": "   " })] {
        let response = app.clone().oneshot(generate_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["detail"], "URL is required");
    }
}

#[tokio::test]
async fn test_generate_rejects_invalid_url() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_router(dir.path());

    for url in ["not a url", "ftp://example.com/file", "file:///etc/passwd"] {
        let response = app
            .clone()
            .oneshot(generate_request(json!({ "url": url })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "url: {}", url);
    }
}

#[tokio::test]
async fn test_generate_rejects_malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_router(dir.path());

    let request = Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_router(dir.path());

    let response = app
        .oneshot(get("/api/progress/00000000-0000-0000-0000-000000000000"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["detail"], "Job not found");
}

#[tokio::test]
async fn test_generate_then_download() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_router(dir.path());

    let job_id = submit(&app, "https://example.com").await;

    let response = app
        .clone()
        .oneshot(get(&format!("/api/progress/{}", job_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let first = body_json(response).await;
    assert!(["queued", "running", "completed"].contains(&first["status"].as_str().unwrap()));

    let done = wait_for_terminal(&app, &job_id).await;
    assert_eq!(done["status"], "completed");
    assert_eq!(done["progress"], 100);
    assert!(done["error"].is_null());

    let video = done["video_path"].as_str().unwrap();
    let document = done["ppt_path"].as_str().unwrap();
    assert_eq!(video, format!("presentation_{}.mp4", job_id));
    assert!(document.ends_with(".pptx"));

    let response = app
        .clone()
        .oneshot(get(&format!("/api/download/{}", video)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment;"));
    assert!(disposition.contains(video));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], VIDEO_BYTES);

    let response = app
        .oneshot(get(&format!("/api/download/{}", document)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_failed_scrape_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_router(dir.path());

    let job_id = submit(&app, "https://bad.invalid").await;
    let done = wait_for_terminal(&app, &job_id).await;

    assert_eq!(done["status"], "error");
    assert_eq!(done["progress"], 10);
    assert!(!done["error"].as_str().unwrap().is_empty());
    assert!(done["video_path"].is_null());
    assert!(done["ppt_path"].is_null());
}

#[tokio::test]
async fn test_download_refuses_unrecorded_and_traversal() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("secret.mp4"), b"secret").await.unwrap();
    let app = create_test_router(dir.path());

    for uri in [
        "/api/download/secret.mp4",
        "/api/download/presentation_missing.mp4",
        "/api/download/..%2Fsecret.mp4",
        "/api/download/%2E%2E",
    ] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "uri: {}", uri);
    }
}

#[tokio::test]
async fn test_concurrent_jobs_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_router(dir.path());

    let first = submit(&app, "https://example.com/one").await;
    let second = submit(&app, "https://example.com/two").await;
    assert_ne!(first, second);

    for job_id in [&first, &second] {
        let done = wait_for_terminal(&app, job_id).await;
        assert_eq!(done["status"], "completed");
        assert_eq!(done["video_path"], format!("presentation_{}.mp4", job_id));
        assert!(dir.path().join(job_id).join("source.md").is_file());
    }
}

#[tokio::test]
async fn test_state_requires_api_keys() {
    let pipeline = PipelineConfig::default();
    assert!(AppState::new(ApiConfig::default(), pipeline).is_err());
}

#[tokio::test]
async fn test_generate_returns_before_pipeline_finishes() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_router_with(dir.path(), Arc::new(SlowScraper));

    let started = std::time::Instant::now();
    let job_id = tokio::time::timeout(
        Duration::from_secs(1),
        submit(&app, "https://example.com/slow"),
    )
    .await
    .expect("generate blocked on the pipeline");
    assert!(started.elapsed() < Duration::from_secs(1));

    let response = app
        .clone()
        .oneshot(get(&format!("/api/progress/{}", job_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(
        body["status"] == "queued" || body["status"] == "running",
        "unexpected status {}",
        body["status"]
    );
}
