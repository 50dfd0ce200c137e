//! Stage runner: drives one job through the six fixed stages.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::Instrument;

use presently_models::Stage;

use crate::collaborators::Collaborators;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::registry::{JobHandle, JobOutputs};
use crate::retry::{retry_async, RetryConfig};
use crate::workspace::JobWorkspace;

/// Runs generation jobs on background tasks.
///
/// At most `max_concurrent_jobs` pipelines run at once; jobs waiting for a
/// slot stay `queued`.
#[derive(Clone)]
pub struct StageRunner {
    collaborators: Collaborators,
    config: Arc<PipelineConfig>,
    permits: Arc<Semaphore>,
}

impl StageRunner {
    pub fn new(collaborators: Collaborators, config: PipelineConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self {
            collaborators,
            config: Arc::new(config),
            permits,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the job on its own task. The caller never awaits pipeline work.
    pub fn spawn(&self, handle: JobHandle) -> JoinHandle<()> {
        let runner = self.clone();
        tokio::spawn(async move { runner.run(handle).await })
    }

    /// Run the job to its terminal status.
    pub async fn run(&self, handle: JobHandle) {
        let logger = JobLogger::new(handle.id(), "generate_video");
        let span = logger.create_span();

        async {
            let _permit = match Arc::clone(&self.permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    logger.log_error("Runner is shut down");
                    return;
                }
            };

            if let Err(e) = handle.start().await {
                logger.log_error(&format!("Cannot start job: {}", e));
                return;
            }
            let url = handle.snapshot().await.url;
            logger.log_start(&url);

            metrics::inc_jobs_running();
            // A panicking collaborator must still leave the job terminal.
            let result = AssertUnwindSafe(self.execute(&handle, &url, &logger))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(PipelineError::Panicked(panic_message(payload.as_ref()))));
            metrics::dec_jobs_running();

            let result = match result {
                Ok(outputs) => handle.complete(&outputs).await.map(|_| outputs),
                Err(e) => Err(e),
            };

            match result {
                Ok(outputs) => {
                    metrics::record_job_completed();
                    logger.log_completion(&format!(
                        "video={} document={}",
                        outputs.video.display(),
                        outputs.document.display()
                    ));
                }
                Err(e) => {
                    let kind = e.kind();
                    metrics::record_job_failed(kind);
                    logger.log_error(&e.to_string());
                    if let Err(fail_err) = handle.fail(kind, e.to_string()).await {
                        logger.log_error(&format!("Cannot record failure: {}", fail_err));
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, handle: &JobHandle, url: &str, logger: &JobLogger) -> PipelineResult<JobOutputs> {
        let job_id = handle.id().clone();
        let workspace = JobWorkspace::create(&self.config.work_dir, &job_id).await?;
        let root = workspace.root();
        let c = &self.collaborators;

        // 1. Extract
        let retry = RetryConfig::new("scrape")
            .with_max_retries(self.config.scrape_retries)
            .with_base_delay(self.config.scrape_retry_delay);
        let scraped = self
            .stage(handle, logger, Stage::Extract, async {
                retry_async(&retry, PipelineError::is_retryable, || c.scraper.scrape(url, root)).await
            })
            .await?;
        logger.log_progress(&format!(
            "Extracted {} sections from {}",
            scraped.sections.len(),
            scraped.canonical_url
        ));

        // 2. Generate
        let content = self
            .stage(handle, logger, Stage::Generate, async {
                let content = c.content.generate(&scraped.markdown_path).await?;
                tokio::fs::write(workspace.presentation_markdown(), &content).await?;
                Ok(content)
            })
            .await?;

        // 3. Document
        let document = root.join(format!(
            "presentation_{}_{}.pptx",
            Utc::now().format("%Y%m%d_%H%M%S"),
            job_id
        ));
        self.stage(handle, logger, Stage::Document, async {
            c.document.build(root, &document).await?;
            ensure_exists(&document, PipelineError::DocumentFailed)
        })
        .await?;

        // 4. Music
        let music = self
            .stage(handle, logger, Stage::Music, c.music.select(root, &content))
            .await?;
        if music.is_none() {
            logger.log_warning("No background music selected");
        }

        // 5. Narration
        let narration = self
            .stage(handle, logger, Stage::Narration, c.narrator.narrate(&content, &workspace.audio_dir()))
            .await?;
        logger.log_progress(&format!("Generated {} narration files", narration.len()));

        // 6. Video
        let video = self
            .stage(handle, logger, Stage::Video, async {
                let slides = c.rasterizer.rasterize(root).await?;
                logger.log_progress(&format!("Rasterized {} slides", slides.len()));
                let assembled = c.assembler.assemble(root).await?;
                ensure_exists(&assembled, PipelineError::AssemblyFailed)?;

                let published = root.join(format!("presentation_{}.mp4", job_id));
                if assembled != published {
                    tokio::fs::rename(&assembled, &published).await?;
                }
                Ok(published)
            })
            .await?;

        Ok(JobOutputs { video, document })
    }

    /// Enter `stage` and run its work under the stage timeout.
    async fn stage<T, F>(&self, handle: &JobHandle, logger: &JobLogger, stage: Stage, work: F) -> PipelineResult<T>
    where
        F: Future<Output = PipelineResult<T>>,
    {
        handle.enter_stage(stage).await?;
        logger.log_stage(stage);

        let started = Instant::now();
        let result = match tokio::time::timeout(self.config.stage_timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::StageTimeout {
                stage,
                secs: self.config.stage_timeout.as_secs(),
            }),
        };
        metrics::record_stage_duration(stage, result.is_ok(), started.elapsed().as_secs_f64());
        result
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn ensure_exists(path: &Path, err: fn(String) -> PipelineError) -> PipelineResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(err(format!("{} was not produced", path.display())))
    }
}
