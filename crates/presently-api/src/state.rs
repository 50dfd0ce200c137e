//! Application state.

use std::sync::Arc;

use presently_pipeline::{
    Collaborators, JobRegistry, PipelineConfig, PipelineResult, RetentionPolicy, StageRunner,
};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub registry: Arc<JobRegistry>,
    pub runner: StageRunner,
}

impl AppState {
    /// Create application state with the production collaborators.
    pub fn new(config: ApiConfig, pipeline: PipelineConfig) -> PipelineResult<Self> {
        let collaborators = Collaborators::from_config(&pipeline)?;
        let registry = JobRegistry::new(RetentionPolicy {
            ttl: pipeline.job_ttl,
            max_jobs: pipeline.max_jobs,
        });
        let runner = StageRunner::new(collaborators, pipeline);

        Ok(Self::from_parts(config, registry, runner))
    }

    /// Assemble state from already-built parts.
    pub fn from_parts(config: ApiConfig, registry: JobRegistry, runner: StageRunner) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            runner,
        }
    }
}
