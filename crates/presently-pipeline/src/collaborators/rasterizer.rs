//! Slide rasterization: pptx -> pdf (LibreOffice) -> png pages (pdftoppm).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use presently_media::{convert_document, rasterize_pdf};

use super::Rasterizer;
use crate::error::{PipelineError, PipelineResult};
use crate::workspace::JobWorkspace;

pub struct SofficeRasterizer {
    dpi: u32,
    timeout: Duration,
}

impl SofficeRasterizer {
    pub fn new(dpi: u32, timeout: Duration) -> Self {
        Self { dpi, timeout }
    }
}

/// Newest slide document in `dir`.
///
/// Document names embed a `YYYYmmdd_HHMMSS` timestamp, so the
/// lexically greatest name is the most recent.
pub async fn newest_document(dir: &Path) -> PipelineResult<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut newest: Option<PathBuf> = None;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_pptx = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("pptx"))
            .unwrap_or(false);
        if !is_pptx {
            continue;
        }
        if newest.as_ref().map_or(true, |n| path.file_name() > n.file_name()) {
            newest = Some(path);
        }
    }
    Ok(newest)
}

#[async_trait]
impl Rasterizer for SofficeRasterizer {
    async fn rasterize(&self, workspace_root: &Path) -> PipelineResult<Vec<PathBuf>> {
        let workspace = JobWorkspace::open(workspace_root);
        let document = newest_document(workspace_root).await?.ok_or_else(|| {
            PipelineError::rasterize_failed(format!(
                "no slide document found in {}",
                workspace_root.display()
            ))
        })?;

        let pdf = convert_document(&document, "pdf", workspace_root, self.timeout).await?;
        let pages = rasterize_pdf(&pdf, workspace.slide_images_dir(), self.dpi, self.timeout).await?;

        if pages.is_empty() {
            return Err(PipelineError::rasterize_failed("document rendered no pages"));
        }

        info!("Rasterized {} into {} slide images", document.display(), pages.len());
        Ok(pages)
    }
}
