//! LibreOffice headless document conversion.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};
use crate::process::{find_tool, run_with_timeout, stderr_tail};

/// Check if LibreOffice is available.
pub fn check_soffice() -> MediaResult<PathBuf> {
    find_tool("soffice", &["soffice", "libreoffice"])
}

/// Convert `input` to `format` (e.g. `pdf`, `pptx`) inside `out_dir`.
///
/// Each call uses a profile directory under `out_dir`, so concurrent
/// conversions for different jobs do not contend on the shared user profile.
/// Returns the path of the converted file.
pub async fn convert_document(
    input: impl AsRef<Path>,
    format: &str,
    out_dir: impl AsRef<Path>,
    timeout: Duration,
) -> MediaResult<PathBuf> {
    let input = input.as_ref();
    let out_dir = out_dir.as_ref();

    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    let soffice = check_soffice()?;
    tokio::fs::create_dir_all(out_dir).await?;

    let profile_dir = absolute(&out_dir.join(".soffice-profile"))?;
    let args = conversion_args(input, format, out_dir, &profile_dir);

    info!("Converting {} to {}", input.display(), format);
    let output = run_with_timeout(&soffice, args, timeout).await?;

    if !output.status.success() {
        return Err(MediaError::conversion_failed(
            "soffice",
            format!("conversion of {} to {} failed", input.display(), format),
            stderr_tail(&output),
        ));
    }

    let stem = input
        .file_stem()
        .ok_or_else(|| MediaError::invalid_media(format!("No file stem: {}", input.display())))?;
    let converted = out_dir.join(stem).with_extension(format);

    if !converted.exists() {
        return Err(MediaError::conversion_failed(
            "soffice",
            format!("expected output {} was not produced", converted.display()),
            stderr_tail(&output),
        ));
    }

    debug!("Converted document written to {}", converted.display());
    Ok(converted)
}

fn conversion_args(input: &Path, format: &str, out_dir: &Path, profile_dir: &Path) -> Vec<OsString> {
    let mut profile = OsString::from("-env:UserInstallation=file://");
    profile.push(profile_dir.as_os_str());

    vec![
        profile,
        "--headless".into(),
        "--norestore".into(),
        "--convert-to".into(),
        format.into(),
        "--outdir".into(),
        out_dir.as_os_str().to_os_string(),
        input.as_os_str().to_os_string(),
    ]
}

fn absolute(path: &Path) -> MediaResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
