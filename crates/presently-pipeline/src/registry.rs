//! In-memory job registry.
//!
//! The registry owns every [`JobRecord`] keyed by [`JobId`]. Request handlers
//! only create records and read cloned snapshots; the stage runner mutates a
//! record exclusively through the [`JobHandle`] returned by
//! [`JobRegistry::create`].
//!
//! Lock order: job map, then a record, then the artifact index.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use presently_models::{ErrorKind, JobId, JobRecord, ModelError, Stage};

use crate::error::{PipelineError, PipelineResult};
use crate::metrics;

/// How long terminal records are kept and how many records the registry holds.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub ttl: Duration,
    pub max_jobs: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(86_400),
            max_jobs: 1000,
        }
    }
}

/// Final files of a completed job, as absolute paths inside its workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutputs {
    pub video: PathBuf,
    pub document: PathBuf,
}

#[derive(Debug, Clone)]
struct Artifact {
    job_id: JobId,
    path: PathBuf,
}

#[derive(Debug)]
struct RegistryInner {
    jobs: RwLock<HashMap<JobId, Arc<RwLock<JobRecord>>>>,
    /// Output file name -> file, for completed jobs only
    artifacts: RwLock<HashMap<String, Artifact>>,
    retention: RetentionPolicy,
}

/// Process-wide mapping from job id to job record.
#[derive(Debug, Clone)]
pub struct JobRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}

impl JobRegistry {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                jobs: RwLock::new(HashMap::new()),
                artifacts: RwLock::new(HashMap::new()),
                retention,
            }),
        }
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.inner.retention
    }

    /// Insert a new queued record for `url` under a fresh id.
    ///
    /// Returns the exclusive mutation handle; its [`JobHandle::id`] is the
    /// identifier reported to the client.
    pub async fn create(&self, url: impl Into<String>) -> JobHandle {
        let id = JobId::new();
        let record = Arc::new(RwLock::new(JobRecord::new(id.clone(), url)));

        let size = {
            let mut jobs = self.inner.jobs.write().await;
            jobs.insert(id.clone(), Arc::clone(&record));
            jobs.len()
        };
        metrics::set_registry_size(size);
        debug!(job_id = %id, "Job registered");

        JobHandle {
            id,
            record,
            registry: Arc::clone(&self.inner),
        }
    }

    /// Snapshot of a record. Unknown ids are a normal `None`.
    pub async fn get(&self, id: &JobId) -> Option<JobRecord> {
        let record = {
            let jobs = self.inner.jobs.read().await;
            jobs.get(id).cloned()
        }?;
        let snapshot = record.read().await.clone();
        Some(snapshot)
    }

    pub async fn len(&self) -> usize {
        self.inner.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Resolve a downloadable output by its bare file name.
    ///
    /// Only names recorded on completed jobs resolve; anything else,
    /// including names with path components, is `None`.
    pub async fn resolve_artifact(&self, filename: &str) -> Option<PathBuf> {
        if !is_bare_file_name(filename) {
            return None;
        }
        let artifacts = self.inner.artifacts.read().await;
        artifacts.get(filename).map(|a| a.path.clone())
    }

    /// Apply the retention policy as of `now`.
    ///
    /// Removes terminal records finished more than `ttl` ago, then, while the
    /// registry is above `max_jobs`, the oldest remaining terminal records.
    /// Queued and running records are never evicted. Returns the evicted ids
    /// so the caller can remove their workspaces.
    pub async fn evict_expired(&self, now: DateTime<Utc>) -> Vec<JobId> {
        let ttl = chrono::Duration::from_std(self.inner.retention.ttl)
            .unwrap_or_else(|_| chrono::Duration::days(36_500));

        let mut jobs = self.inner.jobs.write().await;

        let mut terminal: Vec<(DateTime<Utc>, JobId)> = Vec::new();
        for (id, record) in jobs.iter() {
            let record = record.read().await;
            if let Some(finished_at) = record.finished_at.filter(|_| record.is_terminal()) {
                terminal.push((finished_at, id.clone()));
            }
        }
        terminal.sort();

        let mut evicted = Vec::new();
        let mut remaining = jobs.len();
        for (finished_at, id) in terminal {
            let expired = now - finished_at > ttl;
            let over_capacity = remaining > self.inner.retention.max_jobs;
            if !(expired || over_capacity) {
                // Sorted oldest first: nothing later is expired either.
                break;
            }
            jobs.remove(&id);
            remaining -= 1;
            evicted.push(id);
        }

        if !evicted.is_empty() {
            let mut artifacts = self.inner.artifacts.write().await;
            artifacts.retain(|_, a| !evicted.contains(&a.job_id));
            info!(
                "Evicted {} job(s), {} remaining",
                evicted.len(),
                jobs.len()
            );
            metrics::record_jobs_evicted(evicted.len());
        }
        metrics::set_registry_size(jobs.len());

        evicted
    }
}

fn is_bare_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}

/// Exclusive mutation handle for one job, owned by its pipeline task.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    record: Arc<RwLock<JobRecord>>,
    registry: Arc<RegistryInner>,
}

impl JobHandle {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub async fn snapshot(&self) -> JobRecord {
        self.record.read().await.clone()
    }

    pub async fn start(&self) -> PipelineResult<()> {
        self.record.write().await.start()?;
        Ok(())
    }

    pub async fn enter_stage(&self, stage: Stage) -> PipelineResult<()> {
        self.record.write().await.enter_stage(stage)?;
        Ok(())
    }

    /// Mark the job completed and publish its outputs for download.
    ///
    /// The record stores bare file names; the artifact index maps them back
    /// to the files inside the job workspace.
    pub async fn complete(&self, outputs: &JobOutputs) -> PipelineResult<()> {
        let video_name = file_name(&outputs.video)?;
        let document_name = file_name(&outputs.document)?;

        let mut record = self.record.write().await;
        record.complete(video_name.clone(), document_name.clone())?;

        let mut artifacts = self.registry.artifacts.write().await;
        for (name, path) in [
            (video_name, &outputs.video),
            (document_name, &outputs.document),
        ] {
            artifacts.insert(
                name,
                Artifact {
                    job_id: self.id.clone(),
                    path: path.clone(),
                },
            );
        }
        Ok(())
    }

    pub async fn fail(&self, kind: ErrorKind, detail: impl Into<String>) -> PipelineResult<()> {
        self.record.write().await.fail(kind, detail)?;
        Ok(())
    }
}

fn file_name(path: &Path) -> PipelineResult<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            PipelineError::JobState(ModelError::validation(format!(
                "output path has no file name: {}",
                path.display()
            )))
        })
}
