//! HTTP page scraper.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use super::{ContentSection, ScrapeOutput, Scraper};
use crate::error::{PipelineError, PipelineResult};
use crate::workspace::JobWorkspace;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; PresentlyBot/1.0; +https://presently.app)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

static NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let mut patterns: Vec<Regex> = ["script", "style", "noscript", "svg", "template", "nav", "footer"]
        .iter()
        .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).unwrap())
        .collect();
    patterns.push(Regex::new(r"(?s)<!--.*?-->").unwrap());
    patterns
});
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").unwrap());
// No backreferences in `regex`; the closing tag is matched loosely.
static BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(h[1-6]|p|li)\b[^>]*>(.*?)</(?:h[1-6]|p|li)\s*>").unwrap()
});
static IMG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Text extracted from one HTML document.
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    pub title: Option<String>,
    pub sections: Vec<ContentSection>,
    pub image_sources: Vec<String>,
}

impl ExtractedPage {
    pub fn has_content(&self) -> bool {
        self.sections.iter().any(|s| !s.paragraphs.is_empty())
    }

    /// Markdown rendering handed to the content generator.
    pub fn to_markdown(&self, source_url: &str) -> String {
        let mut md = String::new();
        if let Some(title) = &self.title {
            md.push_str(&format!("# {}\n\n", title));
        }
        md.push_str(&format!("Source: {}\n\n", source_url));
        for section in &self.sections {
            if let Some(heading) = &section.heading {
                md.push_str(&format!("## {}\n\n", heading));
            }
            for paragraph in &section.paragraphs {
                md.push_str(paragraph);
                md.push_str("\n\n");
            }
        }
        md
    }
}

/// Pull the title, headed sections and image sources out of raw HTML.
pub fn extract_page(html: &str) -> ExtractedPage {
    let title = TITLE
        .captures(html)
        .map(|c| clean_text(&c[1]))
        .filter(|t| !t.is_empty());

    let image_sources = IMG
        .captures_iter(html)
        .map(|c| decode_entities(c[1].trim()))
        .collect();

    let mut body = html.to_string();
    for pattern in NOISE.iter() {
        body = pattern.replace_all(&body, " ").into_owned();
    }

    let mut sections: Vec<ContentSection> = Vec::new();
    for block in BLOCK.captures_iter(&body) {
        let text = clean_text(&block[2]);
        if text.is_empty() {
            continue;
        }
        let tag = block[1].to_ascii_lowercase();
        if tag.starts_with('h') {
            sections.push(ContentSection {
                heading: Some(text),
                paragraphs: Vec::new(),
            });
        } else {
            let text = if tag == "li" { format!("- {}", text) } else { text };
            match sections.last_mut() {
                Some(section) => section.paragraphs.push(text),
                None => sections.push(ContentSection {
                    heading: None,
                    paragraphs: vec![text],
                }),
            }
        }
    }

    ExtractedPage {
        title,
        sections,
        image_sources,
    }
}

fn clean_text(fragment: &str) -> String {
    let text = TAG.replace_all(fragment, " ");
    let text = decode_entities(&text);
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail
            .find(';')
            .filter(|end| *end <= 10)
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        "mdash" => Some('-'),
        "ndash" => Some('-'),
        "hellip" => Some('…'),
        "rsquo" | "lsquo" => Some('\''),
        "rdquo" | "ldquo" => Some('"'),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}

/// Scraper backed by reqwest and regex extraction.
pub struct HttpScraper {
    client: Client,
    max_images: usize,
}

impl HttpScraper {
    pub fn new(max_images: usize) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, max_images })
    }

    async fn download_images(&self, base: &Url, sources: &[String], dir: &Path) -> Vec<PathBuf> {
        let mut saved = Vec::new();
        for source in sources {
            if saved.len() >= self.max_images {
                break;
            }
            let Ok(image_url) = base.join(source) else {
                continue;
            };
            if !matches!(image_url.scheme(), "http" | "https") {
                continue;
            }
            let index = saved.len() + 1;
            match self.download_image(&image_url, dir, index).await {
                Ok(Some(path)) => saved.push(path),
                Ok(None) => debug!("Skipped non-image {}", image_url),
                Err(e) => warn!("Image download failed for {}: {}", image_url, e),
            }
        }
        saved
    }

    async fn download_image(&self, url: &Url, dir: &Path, index: usize) -> PipelineResult<Option<PathBuf>> {
        let response = self.client.get(url.clone()).send().await?.error_for_status()?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        let Some(ext) = image_extension(&content_type, url.path()) else {
            return Ok(None);
        };

        let bytes = response.bytes().await?;
        if bytes.is_empty() || bytes.len() > MAX_IMAGE_BYTES {
            return Ok(None);
        }

        let path = dir.join(format!("image_{}.{}", index, ext));
        tokio::fs::write(&path, &bytes).await?;
        Ok(Some(path))
    }
}

fn image_extension(content_type: &str, url_path: &str) -> Option<&'static str> {
    let from_type = match content_type.split(';').next().unwrap_or("").trim() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    };
    from_type.or_else(|| {
        let lower = url_path.to_ascii_lowercase();
        [("jpg", "jpg"), ("jpeg", "jpg"), ("png", "png"), ("gif", "gif"), ("webp", "webp")]
            .iter()
            .find(|(suffix, _)| lower.ends_with(&format!(".{}", suffix)))
            .map(|(_, ext)| *ext)
    })
}

#[async_trait]
impl Scraper for HttpScraper {
    async fn scrape(&self, url: &str, workspace_root: &Path) -> PipelineResult<ScrapeOutput> {
        let workspace = JobWorkspace::open(workspace_root);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::scrape_failed(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        let final_url = response.url().clone();
        if !status.is_success() {
            return Err(PipelineError::scrape_failed(format!("{} returned {}", url, status)));
        }

        let raw_html = response
            .text()
            .await
            .map_err(|e| PipelineError::scrape_failed(format!("reading {} failed: {}", url, e)))?;

        let page = extract_page(&raw_html);
        if !page.has_content() {
            return Err(PipelineError::scrape_failed(format!(
                "no readable content found at {}",
                final_url
            )));
        }

        tokio::fs::create_dir_all(workspace.images_dir()).await?;
        let image_paths = self
            .download_images(&final_url, &page.image_sources, &workspace.images_dir())
            .await;

        let markdown_path = workspace.source_markdown();
        tokio::fs::write(&markdown_path, page.to_markdown(final_url.as_str())).await?;

        info!(
            "Scraped {} ({} sections, {} images)",
            final_url,
            page.sections.len(),
            image_paths.len()
        );

        Ok(ScrapeOutput {
            raw_html,
            sections: page.sections,
            image_paths,
            markdown_path,
            workspace_root: workspace_root.to_path_buf(),
            canonical_url: final_url.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<html><head><title>Rust &amp; You</title>
<style>p { color: red }</style></head>
<body>
<script>var p = "<p>not content</p>";</script>
<p>Intro paragraph.</p>
<h1>Ownership</h1>
<p>Every value has <b>one</b> owner.</p>
<ul><li>Move</li><li>Borrow</li></ul>
<!-- <p>hidden</p> -->
<img src="/img/logo.png" alt="logo">
</body></html>"#;

    #[test]
    fn test_extract_page() {
        let page = extract_page(PAGE);

        assert_eq!(page.title.as_deref(), Some("Rust & You"));
        assert_eq!(page.sections.len(), 2);
        assert_eq!(page.sections[0].heading, None);
        assert_eq!(page.sections[0].paragraphs, vec!["Intro paragraph."]);
        assert_eq!(page.sections[1].heading.as_deref(), Some("Ownership"));
        assert_eq!(
            page.sections[1].paragraphs,
            vec!["Every value has one owner.", "- Move", "- Borrow"]
        );
        assert_eq!(page.image_sources, vec!["/img/logo.png"]);
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &lt;b&gt; &#65;&#x42; &unknown; &"), "a <b> AB &unknown; &");
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("image/png", "/x"), Some("png"));
        assert_eq!(image_extension("application/octet-stream", "/a/b.JPEG"), Some("jpg"));
        assert_eq!(image_extension("text/html", "/a/b"), None);
    }

    #[tokio::test]
    async fn test_scrape_writes_markdown_and_images() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/logo.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let scraper = HttpScraper::new(4).unwrap();
        let output = scraper
            .scrape(&format!("{}/article", server.uri()), dir.path())
            .await
            .unwrap();

        assert_eq!(output.markdown_path, dir.path().join("source.md"));
        let markdown = std::fs::read_to_string(&output.markdown_path).unwrap();
        assert!(markdown.starts_with("# Rust & You"));
        assert!(markdown.contains("## Ownership"));
        assert_eq!(output.image_paths, vec![dir.path().join("images/image_1.png")]);
        assert_eq!(output.canonical_url, format!("{}/article", server.uri()));
    }

    #[tokio::test]
    async fn test_scrape_http_error_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = HttpScraper::new(0)
            .unwrap()
            .scrape(&server.uri(), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ScrapeFailed(_)));
    }

    #[tokio::test]
    async fn test_scrape_empty_page_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = HttpScraper::new(0)
            .unwrap()
            .scrape(&server.uri(), dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no readable content"));
    }
}
