//! Presentation content generation with Gemini.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use super::ContentGenerator;
use crate::deck::Deck;
use crate::error::{PipelineError, PipelineResult};
use crate::gemini::GeminiClient;

/// Source text beyond this many characters is cut before prompting.
const MAX_SOURCE_CHARS: usize = 60_000;

pub struct GeminiContentGenerator {
    client: GeminiClient,
}

impl GeminiContentGenerator {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

fn build_prompt(source: &str) -> String {
    format!(
        r#"You are an expert presentation designer. Turn the web page content below
into a concise, engaging slide presentation with spoken narration.

Return ONLY markdown in exactly this format:

# Presentation title
> One or two sentences introducing the presentation.

## Slide title
- Bullet point
- Bullet point
> Narration for this slide, written to be read aloud in two to four sentences.

Rules:
- Produce between 5 and 10 slides.
- Use at most 5 bullets per slide, each under 15 words.
- Every slide must have a narration line starting with "> ".
- Do not include images, tables, links or code blocks.

WEB PAGE CONTENT:
{source}
"#
    )
}

#[async_trait]
impl ContentGenerator for GeminiContentGenerator {
    async fn generate(&self, markdown_path: &Path) -> PipelineResult<String> {
        let source = tokio::fs::read_to_string(markdown_path).await?;
        if source.trim().is_empty() {
            return Err(PipelineError::ai_failed("source markdown is empty"));
        }
        let source: String = source.chars().take(MAX_SOURCE_CHARS).collect();

        let markdown = self.client.generate_text(&build_prompt(&source)).await?;

        // Reject output the document stage could not render.
        let deck = Deck::parse(&markdown)?;
        info!("Generated deck '{}' with {} slides", deck.title, deck.slides.len());

        Ok(markdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn generator_answering(text: &str) -> (MockServer, GeminiContentGenerator) {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        });
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        let client = GeminiClient::new("k")
            .with_base_url(server.uri())
            .with_text_models(vec!["m".into()]);
        (server, GeminiContentGenerator::new(client))
    }

    #[tokio::test]
    async fn test_generate_returns_deck_markdown() {
        let (_server, generator) =
            generator_answering("```markdown\n# Deck\n## One\n- a\n> Spoken.\n```").await;
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.md");
        tokio::fs::write(&source, "# Page\n\nSome text.").await.unwrap();

        let markdown = generator.generate(&source).await.unwrap();
        assert!(markdown.starts_with("# Deck"));
    }

    #[tokio::test]
    async fn test_generate_rejects_deck_without_slides() {
        let (_server, generator) = generator_answering("I cannot help with that.").await;
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.md");
        tokio::fs::write(&source, "# Page").await.unwrap();

        let err = generator.generate(&source).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidDeck(_)));
    }

    #[test]
    fn test_prompt_embeds_source() {
        let prompt = build_prompt("UNIQUE-SOURCE-TEXT");
        assert!(prompt.contains("UNIQUE-SOURCE-TEXT"));
        assert!(prompt.contains("## Slide title"));
    }
}
