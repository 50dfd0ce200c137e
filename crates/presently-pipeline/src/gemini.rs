//! Gemini REST client for slide content and slide illustrations.

use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Text models tried in order until one answers.
const TEXT_MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
    "gemini-2.0-flash",
    "gemini-2.5-pro",
];

const IMAGE_MODEL: &str = "gemini-2.0-flash-exp-image-generation";

/// Gemini API client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    text_models: Vec<String>,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseModalities")]
    response_modalities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(rename = "inlineData")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    #[allow(dead_code)]
    mime_type: Option<String>,
    data: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            text_models: TEXT_MODELS.iter().map(|m| m.to_string()).collect(),
            client: Client::new(),
        }
    }

    /// Create a client from `GEMINI_API_KEY`.
    pub fn from_env() -> PipelineResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| PipelineError::config_error("GEMINI_API_KEY not set"))?;
        Ok(Self::new(api_key))
    }

    /// Point the client at another endpoint (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_text_models(mut self, models: Vec<String>) -> Self {
        self.text_models = models;
        self
    }

    /// Generate text, falling back through the model list.
    ///
    /// Markdown code fences around the answer are removed.
    pub async fn generate_text(&self, prompt: &str) -> PipelineResult<String> {
        let mut last_error = None;

        for model in &self.text_models {
            info!("Attempting Gemini API with model: {}", model);
            match self.call(model, prompt, None).await {
                Ok(response) => match first_text(&response) {
                    Some(text) => {
                        info!("Successfully generated content with {}", model);
                        return Ok(strip_code_fences(&text).to_string());
                    }
                    None => {
                        warn!("Model {} returned no text", model);
                        last_error = Some(PipelineError::ai_failed("No content in Gemini response"));
                    }
                },
                Err(e) => {
                    warn!("Failed with model {}: {}", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| PipelineError::ai_failed("All Gemini models failed")))
    }

    /// Generate one image and return its decoded bytes.
    pub async fn generate_image(&self, prompt: &str) -> PipelineResult<Vec<u8>> {
        let config = GenerationConfig {
            response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
        };
        let response = self.call(IMAGE_MODEL, prompt, Some(config)).await?;

        let data = response
            .candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .find_map(|p| p.inline_data.as_ref())
            .ok_or_else(|| PipelineError::ai_failed("No image data in Gemini response"))?;

        base64::engine::general_purpose::STANDARD
            .decode(data.data.as_bytes())
            .map_err(|e| PipelineError::ai_failed(format!("Invalid image data: {}", e)))
    }

    async fn call(
        &self,
        model: &str,
        prompt: &str,
        generation_config: Option<GenerationConfig>,
    ) -> PipelineResult<GeminiResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config,
        };

        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::ai_failed(format!("Gemini API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::ai_failed(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| PipelineError::ai_failed(format!("Failed to parse Gemini response: {}", e)))
    }
}

fn first_text(response: &GeminiResponse) -> Option<String> {
    response
        .candidates
        .iter()
        .filter_map(|c| c.content.as_ref())
        .flat_map(|c| c.parts.iter())
        .find_map(|p| p.text.clone())
        .filter(|t| !t.trim().is_empty())
}

fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = match text.strip_prefix("```") {
        // Drop the language tag line (```markdown, ```md, ...)
        Some(rest) => rest.split_once('\n').map_or("", |(_, body)| body),
        None => text,
    };
    text.strip_suffix("```").unwrap_or(text).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn text_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```markdown\n# Title\n```"), "# Title");
        assert_eq!(strip_code_fences("```\n## A\n```"), "## A");
        assert_eq!(strip_code_fences("  # Plain  "), "# Plain");
    }

    #[tokio::test]
    async fn test_generate_text_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/first:generateContent"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/models/second:generateContent"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_body("```\n# Deck\n```")))
            .mount(&server)
            .await;

        let client = GeminiClient::new("test-key")
            .with_base_url(server.uri())
            .with_text_models(vec!["first".into(), "second".into()]);

        let text = client.generate_text("prompt").await.unwrap();
        assert_eq!(text, "# Deck");
    }

    #[tokio::test]
    async fn test_generate_text_all_models_fail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = GeminiClient::new("k")
            .with_base_url(server.uri())
            .with_text_models(vec!["only".into()]);

        let err = client.generate_text("prompt").await.unwrap_err();
        assert!(matches!(err, PipelineError::AiFailed(_)));
    }

    #[tokio::test]
    async fn test_generate_image_decodes_inline_data() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Here is your image" },
                { "inlineData": { "mimeType": "image/png", "data": "aGVsbG8=" } }
            ] } }]
        });
        Mock::given(method("POST"))
            .and(path(format!("/models/{}:generateContent", IMAGE_MODEL)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = GeminiClient::new("k").with_base_url(server.uri());
        assert_eq!(client.generate_image("a lighthouse").await.unwrap(), b"hello");
    }
}
