//! FFprobe duration probing.

use serde::Deserialize;
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};
use crate::process::{run_with_timeout, stderr_tail};

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Get the duration of an audio or video file in seconds.
pub async fn probe_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let ffprobe = check_ffprobe()?;
    let args: [&OsStr; 6] = [
        OsStr::new("-v"),
        OsStr::new("quiet"),
        OsStr::new("-print_format"),
        OsStr::new("json"),
        OsStr::new("-show_format"),
        path.as_os_str(),
    ];

    let output = run_with_timeout(&ffprobe, args, PROBE_TIMEOUT).await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed for {}", path.display()),
            stderr: stderr_tail(&output),
        });
    }

    parse_duration(&output.stdout)
}

fn parse_duration(stdout: &[u8]) -> MediaResult<f64> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| MediaError::invalid_media("No duration reported"))
}
