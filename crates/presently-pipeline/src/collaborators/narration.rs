//! Narration with the Google Cloud Text-to-Speech REST API.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Narrator;
use crate::deck::Deck;
use crate::error::{PipelineError, PipelineResult};

const DEFAULT_BASE_URL: &str = "https://texttospeech.googleapis.com/v1";

pub struct GoogleTtsNarrator {
    api_key: String,
    voice: String,
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    #[serde(rename = "audioConfig")]
    audio_config: AudioConfig,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct VoiceSelection<'a> {
    #[serde(rename = "languageCode")]
    language_code: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct AudioConfig {
    #[serde(rename = "audioEncoding")]
    audio_encoding: &'static str,
    #[serde(rename = "speakingRate")]
    speaking_rate: f32,
}

#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    #[serde(rename = "audioContent")]
    audio_content: String,
}

impl GoogleTtsNarrator {
    pub fn new(api_key: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            voice: voice.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn synthesize(&self, text: &str) -> PipelineResult<Vec<u8>> {
        let request = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: language_code(&self.voice),
                name: &self.voice,
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
                speaking_rate: 1.0,
            },
        };

        let response = self
            .client
            .post(format!("{}/text:synthesize", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::narration_failed(format!(
                "Text-to-Speech returned {}: {}",
                status, body
            )));
        }

        let body: SynthesizeResponse = response.json().await?;
        base64::engine::general_purpose::STANDARD
            .decode(body.audio_content.as_bytes())
            .map_err(|e| PipelineError::narration_failed(format!("Invalid audio content: {}", e)))
    }
}

/// `en-US-Neural2-D` -> `en-US`
fn language_code(voice: &str) -> &str {
    let mut dashes = voice.match_indices('-').map(|(i, _)| i);
    match (dashes.next(), dashes.next()) {
        (Some(_), Some(second)) => &voice[..second],
        _ => "en-US",
    }
}

#[async_trait]
impl Narrator for GoogleTtsNarrator {
    async fn narrate(&self, content: &str, audio_dir: &Path) -> PipelineResult<Vec<PathBuf>> {
        let deck = Deck::parse(content)?;
        tokio::fs::create_dir_all(audio_dir).await?;

        let mut files = Vec::new();
        for page in deck.pages() {
            if page.narration.trim().is_empty() {
                debug!("Page {} has no narration", page.number);
                continue;
            }
            let audio = self.synthesize(&page.narration).await?;
            let path = audio_dir.join(format!("slide_{}.mp3", page.number));
            tokio::fs::write(&path, audio).await?;
            files.push(path);
        }

        info!("Generated {} narration files", files.len());
        Ok(files)
    }
}
