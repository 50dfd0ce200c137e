//! Slideshow video operations built on [`FfmpegCommand`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Output frame size; slides are letterboxed into it.
pub const FRAME_WIDTH: u32 = 1920;
pub const FRAME_HEIGHT: u32 = 1080;
const FRAME_RATE: &str = "25";
const AUDIO_RATE: &str = "44100";

/// One still-image segment of the final video.
#[derive(Debug, Clone)]
pub struct SegmentSpec {
    pub image: PathBuf,
    /// Narration played over the slide; silence when absent
    pub audio: Option<PathBuf>,
    pub duration_secs: f64,
}

/// Render a slide image (and optional narration) into an MP4 segment.
///
/// Every segment is encoded with identical stream parameters so the concat
/// demuxer can join them without re-encoding.
pub async fn render_still_segment(
    spec: &SegmentSpec,
    output: impl AsRef<Path>,
    timeout: Duration,
) -> MediaResult<()> {
    if !spec.image.exists() {
        return Err(MediaError::FileNotFound(spec.image.clone()));
    }
    if spec.duration_secs <= 0.0 || !spec.duration_secs.is_finite() {
        return Err(MediaError::invalid_media(format!(
            "Invalid segment duration {}",
            spec.duration_secs
        )));
    }

    let cmd = still_segment_command(spec, output.as_ref());
    debug!("Rendering segment for {}", spec.image.display());
    FfmpegRunner::new().with_timeout(timeout).run(&cmd).await
}

fn still_segment_command(spec: &SegmentSpec, output: &Path) -> FfmpegCommand {
    let scale = format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=white,setsar=1,format=yuv420p",
        w = FRAME_WIDTH,
        h = FRAME_HEIGHT
    );

    let cmd = FfmpegCommand::new(output).input_with(["-loop", "1", "-framerate", FRAME_RATE], &spec.image);

    let cmd = match &spec.audio {
        Some(audio) => cmd.input(audio),
        None => cmd.input_with(
            ["-f", "lavfi"],
            format!("anullsrc=r={}:cl=stereo", AUDIO_RATE),
        ),
    };

    cmd.map("0:v")
        .map("1:a")
        .video_filter(scale)
        .video_codec("libx264")
        .preset("veryfast")
        .output_args(["-tune", "stillimage", "-r", FRAME_RATE])
        .audio_codec("aac")
        .audio_bitrate("192k")
        .output_args(["-ar", AUDIO_RATE, "-ac", "2"])
        .duration(spec.duration_secs)
}

/// Join segments with the concat demuxer (stream copy).
pub async fn concat_segments(
    segments: &[PathBuf],
    list_file: impl AsRef<Path>,
    output: impl AsRef<Path>,
    timeout: Duration,
) -> MediaResult<()> {
    if segments.is_empty() {
        return Err(MediaError::invalid_media("No segments to concatenate"));
    }

    let list_file = list_file.as_ref();
    tokio::fs::write(list_file, concat_list(segments)).await?;

    let cmd = FfmpegCommand::new(output.as_ref())
        .input_with(["-f", "concat", "-safe", "0"], list_file)
        .output_args(["-c", "copy", "-movflags", "+faststart"]);

    info!("Concatenating {} segments", segments.len());
    FfmpegRunner::new().with_timeout(timeout).run(&cmd).await
}

fn concat_list(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', r"'\''")))
        .collect()
}

/// Lay a looping music bed under the video's narration track.
pub async fn mix_music_bed(
    video: impl AsRef<Path>,
    music: impl AsRef<Path>,
    output: impl AsRef<Path>,
    volume: f32,
    timeout: Duration,
) -> MediaResult<()> {
    let music = music.as_ref();
    if !music.exists() {
        return Err(MediaError::FileNotFound(music.to_path_buf()));
    }

    let cmd = music_bed_command(video.as_ref(), music, output.as_ref(), volume);
    info!("Mixing background music {}", music.display());
    FfmpegRunner::new().with_timeout(timeout).run(&cmd).await
}

fn music_bed_command(video: &Path, music: &Path, output: &Path, volume: f32) -> FfmpegCommand {
    let filter = format!(
        "[1:a]volume={:.2}[bed];[0:a][bed]amix=inputs=2:duration=first:dropout_transition=0[aout]",
        volume.clamp(0.0, 1.0)
    );

    FfmpegCommand::new(output)
        .input(video)
        .input_with(["-stream_loop", "-1"], music)
        .filter_complex(filter)
        .map("0:v")
        .map("[aout]")
        .video_codec("copy")
        .audio_codec("aac")
        .audio_bitrate("192k")
        .output_args(["-movflags", "+faststart"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = concat_list(&[
            PathBuf::from("/w/seg_1.mp4"),
            PathBuf::from("/w/it's/seg_2.mp4"),
        ]);
        assert_eq!(list, "file '/w/seg_1.mp4'\nfile '/w/it'\\''s/seg_2.mp4'\n");
    }

    #[test]
    fn test_still_segment_uses_silence_without_narration() {
        let spec = SegmentSpec {
            image: PathBuf::from("slide-1.png"),
            audio: None,
            duration_secs: 5.0,
        };
        let args = still_segment_command(&spec, Path::new("seg.mp4")).build_args();

        assert!(args.iter().any(|a| a.starts_with("anullsrc")));
        assert!(args.contains(&"lavfi".to_string()));
        assert!(args.contains(&"5.000".to_string()));
    }

    #[test]
    fn test_still_segment_with_narration() {
        let spec = SegmentSpec {
            image: PathBuf::from("slide-1.png"),
            audio: Some(PathBuf::from("slide_1.mp3")),
            duration_secs: 7.25,
        };
        let args = still_segment_command(&spec, Path::new("seg.mp4")).build_args();

        assert!(args.contains(&"slide_1.mp3".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("anullsrc")));
    }

    #[test]
    fn test_music_bed_volume_is_clamped() {
        let args = music_bed_command(
            Path::new("in.mp4"),
            Path::new("bed.mp3"),
            Path::new("out.mp4"),
            3.0,
        )
        .build_args();
        assert!(args.iter().any(|a| a.contains("volume=1.00")));
        assert!(args.contains(&"-stream_loop".to_string()));
    }

    #[tokio::test]
    async fn test_concat_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        let result = concat_segments(
            &[],
            dir.path().join("list.txt"),
            dir.path().join("out.mp4"),
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(result, Err(MediaError::InvalidMedia(_))));
    }
}
