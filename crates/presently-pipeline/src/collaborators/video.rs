//! Final video assembly with FFmpeg.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use presently_media::{
    collect_pages, concat_segments, mix_music_bed, probe_duration, render_still_segment,
    SegmentSpec,
};

use super::VideoAssembler;
use crate::error::{PipelineError, PipelineResult};
use crate::workspace::JobWorkspace;

/// Silence kept after each narration so slides do not cut mid-breath.
const NARRATION_TAIL_SECS: f64 = 0.5;

pub struct FfmpegAssembler {
    default_slide_secs: f64,
    music_volume: f32,
    timeout: Duration,
}

impl FfmpegAssembler {
    pub fn new(default_slide_secs: f64, music_volume: f32, timeout: Duration) -> Self {
        Self {
            default_slide_secs,
            music_volume,
            timeout,
        }
    }

    /// Pair each slide image with its narration and on-screen duration.
    async fn segment_specs(&self, workspace: &JobWorkspace, slides: Vec<PathBuf>) -> Vec<SegmentSpec> {
        let mut specs = Vec::with_capacity(slides.len());
        for (i, image) in slides.into_iter().enumerate() {
            let audio = workspace.audio_dir().join(format!("slide_{}.mp3", i + 1));
            let (audio, duration_secs) = if audio.exists() {
                match probe_duration(&audio).await {
                    Ok(secs) => (Some(audio), secs + NARRATION_TAIL_SECS),
                    Err(e) => {
                        warn!("Could not probe {}: {}; using default duration", audio.display(), e);
                        (Some(audio), self.default_slide_secs)
                    }
                }
            } else {
                (None, self.default_slide_secs)
            };
            specs.push(SegmentSpec {
                image,
                audio,
                duration_secs,
            });
        }
        specs
    }
}

/// First `background.*` file in the workspace music directory.
async fn background_track(music_dir: &Path) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(music_dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.file_stem().and_then(|s| s.to_str()) == Some("background") {
            return Some(path);
        }
    }
    None
}

#[async_trait]
impl VideoAssembler for FfmpegAssembler {
    async fn assemble(&self, workspace_root: &Path) -> PipelineResult<PathBuf> {
        let workspace = JobWorkspace::open(workspace_root);
        let slides = collect_pages(workspace.slide_images_dir()).await?;
        if slides.is_empty() {
            return Err(PipelineError::assembly_failed("no slide images to assemble"));
        }

        let segments_dir = workspace_root.join("segments");
        tokio::fs::create_dir_all(&segments_dir).await?;

        let specs = self.segment_specs(&workspace, slides).await;
        let mut segments = Vec::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            let segment = segments_dir.join(format!("segment_{}.mp4", i + 1));
            render_still_segment(spec, &segment, self.timeout).await?;
            segments.push(segment);
        }

        let output = workspace.assembled_video();
        let music = background_track(&workspace.music_dir()).await;

        match music {
            Some(music) => {
                let narrated = workspace_root.join("presentation_narrated.mp4");
                concat_segments(&segments, segments_dir.join("concat.txt"), &narrated, self.timeout).await?;
                mix_music_bed(&narrated, &music, &output, self.music_volume, self.timeout).await?;
            }
            None => {
                concat_segments(&segments, segments_dir.join("concat.txt"), &output, self.timeout).await?;
            }
        }

        if !output.exists() {
            return Err(PipelineError::assembly_failed(format!(
                "{} was not produced",
                output.display()
            )));
        }

        let total: f64 = specs.iter().map(|s| s.duration_secs).sum();
        info!(
            "Assembled {} from {} slides ({:.1}s)",
            output.display(),
            specs.len(),
            total
        );
        Ok(output)
    }
}
