//! Background music selection from a local track library.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::MusicSelector;
use crate::error::PipelineResult;
use crate::workspace::JobWorkspace;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a"];

/// Picks the library track whose file name best matches the content.
///
/// Track names are expected to describe the mood, e.g.
/// `calm-technology-ambient.mp3`.
pub struct LibraryMusicSelector {
    library: PathBuf,
}

impl LibraryMusicSelector {
    pub fn new(library: impl Into<PathBuf>) -> Self {
        Self {
            library: library.into(),
        }
    }

    async fn tracks(&self) -> Vec<PathBuf> {
        let mut entries = match tokio::fs::read_dir(&self.library).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Music library {} unavailable: {}", self.library.display(), e);
                return Vec::new();
            }
        };

        let mut tracks = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let is_audio = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_audio && path.is_file() {
                tracks.push(path);
            }
        }
        // Stable tie-breaking
        tracks.sort();
        tracks
    }
}

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(|t| t.to_lowercase())
        .collect()
}

/// Highest keyword overlap wins; ties go to the first track.
fn best_match<'a>(tracks: &'a [PathBuf], content: &str) -> Option<&'a PathBuf> {
    let words = tokens(content);
    let mut best: Option<(&PathBuf, usize)> = None;

    for track in tracks {
        let stem = track.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        let score = tokens(stem).intersection(&words).count();
        debug!("Music candidate {} scored {}", track.display(), score);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((track, score));
        }
    }

    best.map(|(track, _)| track)
}

#[async_trait]
impl MusicSelector for LibraryMusicSelector {
    async fn select(&self, workspace_root: &Path, content: &str) -> PipelineResult<Option<PathBuf>> {
        let tracks = self.tracks().await;
        let Some(track) = best_match(&tracks, content) else {
            info!("No background music available");
            return Ok(None);
        };

        let ext = track.extension().and_then(|e| e.to_str()).unwrap_or("mp3");
        let music_dir = JobWorkspace::open(workspace_root).music_dir();
        tokio::fs::create_dir_all(&music_dir).await?;

        let dest = music_dir.join(format!("background.{}", ext.to_ascii_lowercase()));
        tokio::fs::copy(track, &dest).await?;

        info!("Selected background music {}", track.display());
        Ok(Some(dest))
    }
}
