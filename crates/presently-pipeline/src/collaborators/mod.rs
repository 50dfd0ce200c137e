//! Stage collaborators.
//!
//! Each pipeline stage delegates to one of these traits. The stage runner
//! only knows the traits, so tests drive it with stubs while production
//! wires the implementations below via [`Collaborators::from_config`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::gemini::GeminiClient;

pub mod content;
pub mod document;
pub mod music;
pub mod narration;
pub mod rasterizer;
pub mod scraper;
pub mod video;

pub use content::GeminiContentGenerator;
pub use document::OdpDocumentBuilder;
pub use music::LibraryMusicSelector;
pub use narration::GoogleTtsNarrator;
pub use rasterizer::SofficeRasterizer;
pub use scraper::HttpScraper;
pub use video::FfmpegAssembler;

/// A heading and the paragraphs that follow it on the source page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentSection {
    pub heading: Option<String>,
    pub paragraphs: Vec<String>,
}

/// Everything the extract stage produced.
#[derive(Debug, Clone)]
pub struct ScrapeOutput {
    pub raw_html: String,
    pub sections: Vec<ContentSection>,
    pub image_paths: Vec<PathBuf>,
    pub markdown_path: PathBuf,
    pub workspace_root: PathBuf,
    /// Final URL after redirects
    pub canonical_url: String,
}

#[async_trait]
pub trait Scraper: Send + Sync {
    /// Fetch `url` and write its content as markdown inside `workspace_root`.
    async fn scrape(&self, url: &str, workspace_root: &Path) -> PipelineResult<ScrapeOutput>;
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Turn the scraped markdown into presentation markdown.
    async fn generate(&self, markdown_path: &Path) -> PipelineResult<String>;
}

#[async_trait]
pub trait DocumentBuilder: Send + Sync {
    /// Render the workspace's presentation markdown into `output_file`.
    async fn build(&self, workspace_root: &Path, output_file: &Path) -> PipelineResult<()>;
}

#[async_trait]
pub trait MusicSelector: Send + Sync {
    /// Copy a fitting track into the workspace. `None` means no music.
    async fn select(&self, workspace_root: &Path, content: &str) -> PipelineResult<Option<PathBuf>>;
}

#[async_trait]
pub trait Narrator: Send + Sync {
    /// Write one narration file per page into `audio_dir`, in page order.
    async fn narrate(&self, content: &str, audio_dir: &Path) -> PipelineResult<Vec<PathBuf>>;
}

#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render the workspace's slide document to ordered page images.
    async fn rasterize(&self, workspace_root: &Path) -> PipelineResult<Vec<PathBuf>>;
}

#[async_trait]
pub trait VideoAssembler: Send + Sync {
    /// Assemble the final video from the workspace artifacts.
    async fn assemble(&self, workspace_root: &Path) -> PipelineResult<PathBuf>;
}

/// The full set of stage collaborators used by the stage runner.
#[derive(Clone)]
pub struct Collaborators {
    pub scraper: Arc<dyn Scraper>,
    pub content: Arc<dyn ContentGenerator>,
    pub document: Arc<dyn DocumentBuilder>,
    pub music: Arc<dyn MusicSelector>,
    pub narrator: Arc<dyn Narrator>,
    pub rasterizer: Arc<dyn Rasterizer>,
    pub assembler: Arc<dyn VideoAssembler>,
}

impl Collaborators {
    /// Wire the production collaborators.
    pub fn from_config(config: &PipelineConfig) -> PipelineResult<Self> {
        let gemini_key = config
            .gemini_api_key
            .clone()
            .ok_or_else(|| PipelineError::config_error("GEMINI_API_KEY not set"))?;
        let tts_key = config
            .tts_api_key
            .clone()
            .ok_or_else(|| PipelineError::config_error("GOOGLE_TTS_API_KEY not set"))?;

        let gemini = GeminiClient::new(gemini_key);
        let image_client = config.slide_images.then(|| gemini.clone());

        Ok(Self {
            scraper: Arc::new(HttpScraper::new(config.max_images)?),
            content: Arc::new(GeminiContentGenerator::new(gemini)),
            document: Arc::new(OdpDocumentBuilder::new(image_client, config.stage_timeout)),
            music: Arc::new(LibraryMusicSelector::new(&config.music_dir)),
            narrator: Arc::new(GoogleTtsNarrator::new(tts_key, &config.tts_voice)),
            rasterizer: Arc::new(SofficeRasterizer::new(config.raster_dpi, config.stage_timeout)),
            assembler: Arc::new(FfmpegAssembler::new(
                config.default_slide_secs,
                config.music_volume,
                config.stage_timeout,
            )),
        })
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
