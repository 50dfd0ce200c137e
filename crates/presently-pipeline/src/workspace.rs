//! Per-job working directories.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use presently_models::JobId;

use crate::error::PipelineResult;

/// Isolated working directory of one job: `<work_dir>/<job_id>/`.
///
/// All intermediate and final artifacts of a job live below `root`; two jobs
/// never share a directory.
#[derive(Debug, Clone)]
pub struct JobWorkspace {
    root: PathBuf,
}

impl JobWorkspace {
    pub const SOURCE_MARKDOWN: &'static str = "source.md";
    pub const PRESENTATION_MARKDOWN: &'static str = "presentation.md";
    pub const IMAGES_DIR: &'static str = "images";
    pub const AUDIO_DIR: &'static str = "audio";
    pub const MUSIC_DIR: &'static str = "music";
    pub const SLIDE_IMAGES_DIR: &'static str = "slide_images";
    pub const ASSEMBLED_VIDEO: &'static str = "presentation_video.mp4";

    /// Path of a job's workspace without touching the filesystem.
    pub fn path_for(work_dir: impl AsRef<Path>, job_id: &JobId) -> PathBuf {
        work_dir.as_ref().join(job_id.as_str())
    }

    /// Create the job's directory tree.
    pub async fn create(work_dir: impl AsRef<Path>, job_id: &JobId) -> PipelineResult<Self> {
        let root = Self::path_for(work_dir, job_id);
        fs::create_dir_all(&root).await?;
        for dir in [Self::IMAGES_DIR, Self::AUDIO_DIR, Self::MUSIC_DIR] {
            fs::create_dir_all(root.join(dir)).await?;
        }
        debug!("Created job workspace {}", root.display());
        Ok(Self { root })
    }

    /// Wrap an existing directory.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_markdown(&self) -> PathBuf {
        self.root.join(Self::SOURCE_MARKDOWN)
    }

    pub fn presentation_markdown(&self) -> PathBuf {
        self.root.join(Self::PRESENTATION_MARKDOWN)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join(Self::IMAGES_DIR)
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.root.join(Self::AUDIO_DIR)
    }

    pub fn music_dir(&self) -> PathBuf {
        self.root.join(Self::MUSIC_DIR)
    }

    pub fn slide_images_dir(&self) -> PathBuf {
        self.root.join(Self::SLIDE_IMAGES_DIR)
    }

    pub fn assembled_video(&self) -> PathBuf {
        self.root.join(Self::ASSEMBLED_VIDEO)
    }

    /// Remove a job's workspace. A missing directory is not an error.
    pub async fn remove(work_dir: impl AsRef<Path>, job_id: &JobId) -> PipelineResult<()> {
        let root = Self::path_for(work_dir, job_id);
        match fs::remove_dir_all(&root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_workspaces_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let a = JobWorkspace::create(dir.path(), &JobId::from_string("a")).await.unwrap();
        let b = JobWorkspace::create(dir.path(), &JobId::from_string("b")).await.unwrap();

        assert_ne!(a.root(), b.root());
        assert!(a.audio_dir().is_dir());
        assert!(b.images_dir().is_dir());
        assert_eq!(a.root(), dir.path().join("a"));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let id = JobId::from_string("gone");
        JobWorkspace::create(dir.path(), &id).await.unwrap();

        JobWorkspace::remove(dir.path(), &id).await.unwrap();
        assert!(!dir.path().join("gone").exists());
        JobWorkspace::remove(dir.path(), &id).await.unwrap();
    }
}
