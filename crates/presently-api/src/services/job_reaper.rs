//! Background service enforcing job retention.
//!
//! Every tick the reaper evicts terminal jobs past their TTL (and the oldest
//! terminal jobs beyond registry capacity), then deletes their working
//! directories. Queued and running jobs are never touched.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use presently_models::JobId;
use presently_pipeline::{JobRegistry, JobWorkspace};

/// Interval between retention sweeps.
const REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Job reaper service.
pub struct JobReaper {
    registry: Arc<JobRegistry>,
    work_dir: PathBuf,
    interval: Duration,
    enabled: bool,
}

impl JobReaper {
    /// Create a new job reaper.
    pub fn new(registry: Arc<JobRegistry>, work_dir: impl Into<PathBuf>) -> Self {
        let enabled = std::env::var("ENABLE_JOB_REAPER")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        Self {
            registry,
            work_dir: work_dir.into(),
            interval: REAP_INTERVAL,
            enabled,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start the background loop.
    ///
    /// Runs until the task is dropped; spawn it.
    pub async fn run(&self) {
        if !self.enabled {
            info!("Job reaper is disabled");
            return;
        }

        info!("Starting job reaper (interval: {:?})", self.interval);

        let mut ticker = interval(self.interval);

        loop {
            ticker.tick().await;

            if let Err(e) = self.reap_once(Utc::now()).await {
                error!("Job reaping error: {}", e);
            }
        }
    }

    /// Run a single sweep at `now`, returning the evicted job ids.
    pub async fn reap_once(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<JobId>> {
        let evicted = self.registry.evict_expired(now).await;
        if evicted.is_empty() {
            debug!("No jobs to evict");
            return Ok(evicted);
        }

        let mut failures = 0usize;
        for job_id in &evicted {
            if let Err(e) = JobWorkspace::remove(&self.work_dir, job_id).await {
                warn!(job_id = %job_id, "Failed to remove job workspace: {}", e);
                failures += 1;
            }
        }

        info!(
            evicted = evicted.len(),
            cleanup_failures = failures,
            "Evicted expired jobs"
        );

        if failures > 0 {
            anyhow::bail!("{} of {} workspaces could not be removed", failures, evicted.len());
        }
        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presently_models::{ErrorKind, JobStatus};
    use presently_pipeline::RetentionPolicy;

    #[tokio::test]
    async fn test_reap_removes_expired_job_and_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(JobRegistry::new(RetentionPolicy {
            ttl: Duration::from_secs(60),
            max_jobs: 100,
        }));

        let done = registry.create("https://example.com/a").await;
        done.start().await.unwrap();
        done.fail(ErrorKind::StageFailure, "boom").await.unwrap();
        let done_id = done.id().clone();
        JobWorkspace::create(dir.path(), &done_id).await.unwrap();

        let running = registry.create("https://example.com/b").await;
        running.start().await.unwrap();
        let running_id = running.id().clone();
        JobWorkspace::create(dir.path(), &running_id).await.unwrap();

        let reaper = JobReaper::new(Arc::clone(&registry), dir.path());
        let later = Utc::now() + chrono::Duration::seconds(3600);
        let evicted = reaper.reap_once(later).await.unwrap();

        assert_eq!(evicted, vec![done_id.clone()]);
        assert!(registry.get(&done_id).await.is_none());
        assert!(!JobWorkspace::path_for(dir.path(), &done_id).exists());

        let still_running = registry.get(&running_id).await.unwrap();
        assert_eq!(still_running.status, JobStatus::Running);
        assert!(JobWorkspace::path_for(dir.path(), &running_id).exists());
    }

    #[tokio::test]
    async fn test_reap_with_nothing_expired() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(JobRegistry::default());
        registry.create("https://example.com").await;

        let reaper = JobReaper::new(Arc::clone(&registry), dir.path());
        assert!(reaper.reap_once(Utc::now()).await.unwrap().is_empty());
        assert_eq!(registry.len().await, 1);
    }
}
