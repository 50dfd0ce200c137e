//! Media tool wrappers for slide-video rendering.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Progress parsing from `-progress pipe:2`
//! - Subprocess timeouts via tokio
//! - FFprobe duration probing
//! - LibreOffice (`soffice`) document conversion
//! - Poppler (`pdftoppm`) PDF rasterization
//! - Slideshow operations (still segments, concat, music bed)

pub mod command;
pub mod error;
pub mod office;
pub mod probe;
pub mod process;
pub mod progress;
pub mod raster;
pub mod slideshow;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use office::{check_soffice, convert_document};
pub use probe::probe_duration;
pub use progress::FfmpegProgress;
pub use raster::{check_pdftoppm, collect_pages, rasterize_pdf};
pub use slideshow::{concat_segments, mix_music_bed, render_still_segment, SegmentSpec};
