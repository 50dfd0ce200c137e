//! Shared subprocess execution for the non-FFmpeg tools.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Maximum stderr bytes kept in error values.
const STDERR_TAIL_BYTES: usize = 2048;

/// Locate the first available program among `candidates`.
pub fn find_tool(name: &'static str, candidates: &[&str]) -> MediaResult<PathBuf> {
    candidates
        .iter()
        .find_map(|c| which::which(c).ok())
        .ok_or(MediaError::ToolNotFound(name))
}

/// Run a program to completion with a time budget, capturing output.
///
/// The child is killed when the budget elapses.
pub async fn run_with_timeout<I, S>(
    program: &PathBuf,
    args: I,
    timeout: Duration,
) -> MediaResult<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Running {}", program.display());

    let child = cmd.spawn()?;
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => Ok(output?),
        Err(_) => {
            warn!(
                "{} timed out after {} seconds, killing process",
                program.display(),
                timeout.as_secs()
            );
            Err(MediaError::Timeout(timeout.as_secs()))
        }
    }
}

/// Last bytes of a process's stderr, for error messages.
pub fn stderr_tail(output: &Output) -> Option<String> {
    let text = String::from_utf8_lossy(&output.stderr);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let start = text.len().saturating_sub(STDERR_TAIL_BYTES);
    let start = (start..text.len())
        .find(|i| text.is_char_boundary(*i))
        .unwrap_or(text.len());
    Some(text[start..].to_string())
}
