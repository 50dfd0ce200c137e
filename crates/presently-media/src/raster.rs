//! PDF page rasterization with Poppler's `pdftoppm`.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::error::{MediaError, MediaResult};
use crate::process::{find_tool, run_with_timeout, stderr_tail};

/// File name prefix of rasterized pages (`slide-1.png`, `slide-2.png`, ...).
pub const PAGE_PREFIX: &str = "slide";

/// Check if pdftoppm is available.
pub fn check_pdftoppm() -> MediaResult<PathBuf> {
    find_tool("pdftoppm", &["pdftoppm"])
}

/// Render every page of `pdf` to PNG in `out_dir`, returning the images in
/// page order.
pub async fn rasterize_pdf(
    pdf: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    dpi: u32,
    timeout: Duration,
) -> MediaResult<Vec<PathBuf>> {
    let pdf = pdf.as_ref();
    let out_dir = out_dir.as_ref();

    if !pdf.exists() {
        return Err(MediaError::FileNotFound(pdf.to_path_buf()));
    }

    let pdftoppm = check_pdftoppm()?;
    tokio::fs::create_dir_all(out_dir).await?;

    let prefix = out_dir.join(PAGE_PREFIX);
    let dpi = dpi.to_string();
    let args: [&OsStr; 5] = [
        OsStr::new("-png"),
        OsStr::new("-r"),
        OsStr::new(&dpi),
        pdf.as_os_str(),
        prefix.as_os_str(),
    ];

    info!("Rasterizing {} at {} dpi", pdf.display(), dpi);
    let output = run_with_timeout(&pdftoppm, args, timeout).await?;

    if !output.status.success() {
        return Err(MediaError::conversion_failed(
            "pdftoppm",
            format!("rasterizing {} failed", pdf.display()),
            stderr_tail(&output),
        ));
    }

    let pages = collect_pages(out_dir).await?;
    if pages.is_empty() {
        return Err(MediaError::conversion_failed(
            "pdftoppm",
            format!("no pages rendered from {}", pdf.display()),
            None,
        ));
    }
    Ok(pages)
}

/// List rendered pages sorted by page number.
///
/// `pdftoppm` zero-pads page numbers to the width of the page count, so the
/// numeric suffix is parsed rather than relying on lexical order.
pub async fn collect_pages(dir: impl AsRef<Path>) -> MediaResult<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir.as_ref()).await?;
    let mut pages: Vec<(u32, PathBuf)> = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if let Some(number) = page_number(&path) {
            pages.push((number, path));
        }
    }

    pages.sort_by_key(|(n, _)| *n);
    Ok(pages.into_iter().map(|(_, p)| p).collect())
}

fn page_number(path: &Path) -> Option<u32> {
    if path.extension()? != "png" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix(PAGE_PREFIX)?
        .strip_prefix('-')?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_number() {
        assert_eq!(page_number(Path::new("/x/slide-01.png")), Some(1));
        assert_eq!(page_number(Path::new("/x/slide-12.png")), Some(12));
        assert_eq!(page_number(Path::new("/x/slide-1.jpg")), None);
        assert_eq!(page_number(Path::new("/x/cover.png")), None);
    }

    #[tokio::test]
    async fn test_collect_pages_numeric_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["slide-10.png", "slide-02.png", "slide-1.png", "notes.txt"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }

        let pages = collect_pages(dir.path()).await.unwrap();
        let names: Vec<_> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["slide-1.png", "slide-02.png", "slide-10.png"]);
    }
}
