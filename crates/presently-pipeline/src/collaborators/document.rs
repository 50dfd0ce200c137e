//! Slide document rendering.
//!
//! The deck is written as a flat ODF presentation (`.fodp`, a single XML
//! file) and converted to `.pptx` by LibreOffice.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use tracing::{debug, info, warn};

use presently_media::convert_document;

use super::DocumentBuilder;
use crate::deck::{Deck, Page};
use crate::error::{PipelineError, PipelineResult};
use crate::gemini::GeminiClient;
use crate::workspace::JobWorkspace;

/// Renders presentation markdown to a `.pptx` via a flat ODP file.
pub struct OdpDocumentBuilder {
    /// Set when slide illustrations are enabled
    image_client: Option<GeminiClient>,
    timeout: Duration,
}

impl OdpDocumentBuilder {
    pub fn new(image_client: Option<GeminiClient>, timeout: Duration) -> Self {
        Self {
            image_client,
            timeout,
        }
    }

    /// Generate one illustration per content page. Failures are skipped.
    async fn illustrate(&self, pages: &[Page], workspace: &JobWorkspace) -> HashMap<usize, Vec<u8>> {
        let mut images = HashMap::new();
        let Some(client) = &self.image_client else {
            return images;
        };

        for page in pages.iter().skip(1) {
            let prompt = format!(
                "Create a professional 3D-styled illustration for a presentation slide on the \
                 topic: {}. Keep it relevant to the topic. Do not write any text on the image.",
                page.title
            );
            match client.generate_image(&prompt).await {
                Ok(bytes) => {
                    let path = workspace.images_dir().join(format!("slide_{}.png", page.number));
                    if let Err(e) = tokio::fs::write(&path, &bytes).await {
                        warn!("Could not save slide image {}: {}", path.display(), e);
                    }
                    images.insert(page.number, bytes);
                }
                Err(e) => warn!("Image generation failed for slide {}: {}", page.number, e),
            }
        }
        images
    }
}

#[async_trait]
impl DocumentBuilder for OdpDocumentBuilder {
    async fn build(&self, workspace_root: &Path, output_file: &Path) -> PipelineResult<()> {
        let workspace = JobWorkspace::open(workspace_root);
        let markdown = tokio::fs::read_to_string(workspace.presentation_markdown()).await?;
        let deck = Deck::parse(&markdown)?;
        let pages = deck.pages();

        tokio::fs::create_dir_all(workspace.images_dir()).await?;
        let images = self.illustrate(&pages, &workspace).await;

        let out_dir = output_file.parent().unwrap_or(workspace_root);
        let flat = output_file.with_extension("fodp");
        tokio::fs::write(&flat, render_flat_odp(&deck.title, &pages, &images)).await?;
        debug!("Wrote flat presentation {}", flat.display());

        let converted = convert_document(&flat, "pptx", out_dir, self.timeout).await?;
        if converted != output_file {
            tokio::fs::rename(&converted, output_file).await?;
        }
        if !output_file.exists() {
            return Err(PipelineError::document_failed(format!(
                "{} was not produced",
                output_file.display()
            )));
        }

        info!(
            "Created slide document {} ({} pages, {} illustrated)",
            output_file.display(),
            pages.len(),
            images.len()
        );
        Ok(())
    }
}

const PAGE_WIDTH_CM: f32 = 28.0;
const PAGE_HEIGHT_CM: f32 = 15.75;

/// Render pages to flat ODP XML. `images` maps page numbers to PNG bytes.
pub fn render_flat_odp(title: &str, pages: &[Page], images: &HashMap<usize, Vec<u8>>) -> String {
    let mut xml = String::with_capacity(8 * 1024);
    xml.push_str(concat!(
        r#"<?xml version="1.0" encoding="UTF-8"?>"#,
        "\n",
        r#"<office:document xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0""#,
        r#" xmlns:style="urn:oasis:names:tc:opendocument:xmlns:style:1.0""#,
        r#" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0""#,
        r#" xmlns:draw="urn:oasis:names:tc:opendocument:xmlns:drawing:1.0""#,
        r#" xmlns:fo="urn:oasis:names:tc:opendocument:xmlns:xsl-fo-compatible:1.0""#,
        r#" xmlns:svg="urn:oasis:names:tc:opendocument:xmlns:svg-compatible:1.0""#,
        r#" xmlns:presentation="urn:oasis:names:tc:opendocument:xmlns:presentation:1.0""#,
        r#" xmlns:dc="http://purl.org/dc/elements/1.1/""#,
        r#" xmlns:xlink="http://www.w3.org/1999/xlink""#,
        r#" office:version="1.2" office:mimetype="application/vnd.oasis.opendocument.presentation">"#,
        "\n"
    ));

    let _ = write!(
        xml,
        "<office:meta><dc:title>{}</dc:title></office:meta>\n",
        escape_xml(title)
    );

    let _ = write!(
        xml,
        concat!(
            "<office:automatic-styles>\n",
            r#"<style:page-layout style:name="PM1"><style:page-layout-properties fo:margin-top="0cm" fo:margin-bottom="0cm" fo:margin-left="0cm" fo:margin-right="0cm" fo:page-width="{w}cm" fo:page-height="{h}cm" style:print-orientation="landscape"/></style:page-layout>"#,
            "\n",
            r##"<style:style style:name="dp1" style:family="drawing-page"><style:drawing-page-properties draw:fill="solid" draw:fill-color="#ffffff"/></style:style>"##,
            "\n",
            r#"<style:style style:name="gr1" style:family="graphic"><style:graphic-properties draw:stroke="none" draw:fill="none"/></style:style>"#,
            "\n",
            r##"<style:style style:name="Pcover" style:family="paragraph"><style:paragraph-properties fo:text-align="center"/><style:text-properties fo:font-size="40pt" fo:font-weight="bold" fo:color="#1f2937"/></style:style>"##,
            "\n",
            r##"<style:style style:name="Ptitle" style:family="paragraph"><style:text-properties fo:font-size="32pt" fo:font-weight="bold" fo:color="#1f2937"/></style:style>"##,
            "\n",
            r##"<style:style style:name="Pbody" style:family="paragraph"><style:paragraph-properties fo:margin-bottom="0.3cm"/><style:text-properties fo:font-size="20pt" fo:color="#374151"/></style:style>"##,
            "\n",
            "</office:automatic-styles>\n",
            r#"<office:master-styles><style:master-page style:name="Default" style:page-layout-name="PM1" draw:style-name="dp1"/></office:master-styles>"#,
            "\n",
            "<office:body><office:presentation>\n"
        ),
        w = PAGE_WIDTH_CM,
        h = PAGE_HEIGHT_CM
    );

    for page in pages {
        render_page(&mut xml, page, images.get(&page.number).map(Vec::as_slice));
    }

    xml.push_str("</office:presentation></office:body>\n</office:document>\n");
    xml
}

fn render_page(xml: &mut String, page: &Page, image: Option<&[u8]>) {
    let _ = write!(
        xml,
        r#"<draw:page draw:name="page{n}" draw:master-page-name="Default" draw:style-name="dp1">"#,
        n = page.number
    );
    xml.push('\n');

    if page.number == 1 {
        text_frame(xml, 1.5, 5.5, PAGE_WIDTH_CM - 3.0, 4.0, "Pcover", &[page.title.as_str()]);
    } else {
        text_frame(xml, 1.5, 0.8, PAGE_WIDTH_CM - 3.0, 2.4, "Ptitle", &[page.title.as_str()]);

        let body_width = if image.is_some() { 13.5 } else { PAGE_WIDTH_CM - 3.0 };
        let bullets: Vec<String> = page.bullets.iter().map(|b| format!("• {}", b)).collect();
        let bullets: Vec<&str> = bullets.iter().map(String::as_str).collect();
        text_frame(xml, 1.5, 3.6, body_width, 11.0, "Pbody", &bullets);

        if let Some(bytes) = image {
            let _ = write!(
                xml,
                r#"<draw:frame draw:style-name="gr1" svg:x="15.5cm" svg:y="3.6cm" svg:width="11cm" svg:height="11cm"><draw:image><office:binary-data>{}</office:binary-data></draw:image></draw:frame>"#,
                base64::engine::general_purpose::STANDARD.encode(bytes)
            );
            xml.push('\n');
        }
    }

    // Speaker notes carry the narration
    xml.push_str("<presentation:notes>");
    text_frame(xml, 2.0, 14.0, 17.0, 10.0, "Pbody", &[page.narration.as_str()]);
    xml.push_str("</presentation:notes>\n</draw:page>\n");
}

fn text_frame(xml: &mut String, x: f32, y: f32, width: f32, height: f32, style: &str, paragraphs: &[&str]) {
    let _ = write!(
        xml,
        r#"<draw:frame draw:style-name="gr1" svg:x="{x}cm" svg:y="{y}cm" svg:width="{width}cm" svg:height="{height}cm"><draw:text-box>"#
    );
    for paragraph in paragraphs {
        let _ = write!(
            xml,
            r#"<text:p text:style-name="{style}">{}</text:p>"#,
            escape_xml(paragraph)
        );
    }
    xml.push_str("</draw:text-box></draw:frame>\n");
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Control characters are invalid in XML 1.0
            c if c.is_control() && !matches!(c, '\n' | '\t') => {}
            c => out.push(c),
        }
    }
    out
}
