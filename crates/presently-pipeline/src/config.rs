//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root directory; each job gets `<work_dir>/<job_id>/`
    pub work_dir: PathBuf,
    /// Maximum pipelines running at once; further jobs stay queued
    pub max_concurrent_jobs: usize,
    /// Time budget for any single stage
    pub stage_timeout: Duration,
    /// Extra attempts for the scrape stage
    pub scrape_retries: u32,
    /// Base delay between scrape attempts
    pub scrape_retry_delay: Duration,
    /// Directory holding background music tracks
    pub music_dir: PathBuf,
    /// Maximum page images downloaded by the scraper
    pub max_images: usize,
    /// Generate one illustration per slide with Gemini
    pub slide_images: bool,
    /// Rasterization resolution
    pub raster_dpi: u32,
    /// Slide duration when a slide has no narration
    pub default_slide_secs: f64,
    /// Background music volume relative to narration (0.0-1.0)
    pub music_volume: f32,
    /// How long terminal jobs are kept
    pub job_ttl: Duration,
    /// Registry capacity before oldest terminal jobs are evicted
    pub max_jobs: usize,
    /// Gemini API key
    pub gemini_api_key: Option<String>,
    /// Google Cloud Text-to-Speech API key
    pub tts_api_key: Option<String>,
    /// Text-to-Speech voice name
    pub tts_voice: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/presently"),
            max_concurrent_jobs: 2,
            stage_timeout: Duration::from_secs(600),
            scrape_retries: 1,
            scrape_retry_delay: Duration::from_millis(500),
            music_dir: PathBuf::from("music"),
            max_images: 8,
            slide_images: false,
            raster_dpi: 110,
            default_slide_secs: 5.0,
            music_volume: 0.15,
            job_ttl: Duration::from_secs(86_400), // 24 hours
            max_jobs: 1000,
            gemini_api_key: None,
            tts_api_key: None,
            tts_voice: "en-US-Neural2-D".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let gemini_api_key = non_empty_var("GEMINI_API_KEY");

        Self {
            work_dir: std::env::var("PRESENTLY_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            max_concurrent_jobs: parse_var("PRESENTLY_MAX_CONCURRENT_JOBS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            stage_timeout: parse_var("PRESENTLY_STAGE_TIMEOUT_SECS")
                .filter(|s: &u64| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.stage_timeout),
            scrape_retries: parse_var("PRESENTLY_SCRAPE_RETRIES").unwrap_or(defaults.scrape_retries),
            scrape_retry_delay: defaults.scrape_retry_delay,
            music_dir: std::env::var("PRESENTLY_MUSIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.music_dir),
            max_images: parse_var("PRESENTLY_MAX_IMAGES").unwrap_or(defaults.max_images),
            slide_images: std::env::var("PRESENTLY_SLIDE_IMAGES")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            raster_dpi: parse_var("PRESENTLY_RASTER_DPI").unwrap_or(defaults.raster_dpi),
            default_slide_secs: parse_var("PRESENTLY_DEFAULT_SLIDE_SECS")
                .filter(|s: &f64| *s > 0.0)
                .unwrap_or(defaults.default_slide_secs),
            music_volume: parse_var("PRESENTLY_MUSIC_VOLUME").unwrap_or(defaults.music_volume),
            job_ttl: Duration::from_secs(parse_var("PRESENTLY_JOB_TTL_SECS").unwrap_or(86_400)),
            max_jobs: parse_var("PRESENTLY_MAX_JOBS").unwrap_or(defaults.max_jobs),
            tts_api_key: non_empty_var("GOOGLE_TTS_API_KEY").or_else(|| gemini_api_key.clone()),
            gemini_api_key,
            tts_voice: std::env::var("PRESENTLY_TTS_VOICE").unwrap_or(defaults.tts_voice),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}
