//! Google Gemini `generateContent` client.

use std::time::Duration;

use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{approx_tokens, Generation};
use crate::{Error, Result};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Used when the selector names no model, or one outside [`GEMINI_MODELS`].
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Models this client will request.
pub const GEMINI_MODELS: &[&str] = &[
    "gemini-1.5-flash",
    "gemini-1.5-pro",
    "gemini-2.0-flash",
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
];

/// Models that receive attached images.
pub const VISION_MODELS: &[&str] = &["gemini-1.5-flash", "gemini-1.5-pro", "gemini-2.0-flash"];

/// Google Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new<S: Into<String>>(api_key: S) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::InvalidArgument("GEMINI_API_KEY is empty".to_string()));
        }

        let http = Client::builder()
            .user_agent("rag_chatbot/0.1.0")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::InvalidArgument(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: GEMINI_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn resolve_model(model: &str) -> &'static str {
        GEMINI_MODELS
            .iter()
            .copied()
            .find(|known| *known == model)
            .unwrap_or(DEFAULT_MODEL)
    }

    pub fn supports_vision(model: &str) -> bool {
        VISION_MODELS.contains(&model)
    }

    /// Generate a reply. Images are attached only for vision models;
    /// entries that are not valid base64 are skipped.
    pub async fn generate(&self, model: &str, prompt: &str, images: &[String]) -> Result<Generation> {
        let model = Self::resolve_model(model);

        let mut parts = vec![Part::Text {
            text: prompt.to_string(),
        }];
        if Self::supports_vision(model) {
            parts.extend(images.iter().filter_map(|image| inline_image(image)));
        }

        let payload = GeminiRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            generation_config: Some(GenerationConfig {
                temperature: 0.7,
                max_output_tokens: 4096,
            }),
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::ProviderError(format!("request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::ProviderError(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::ProviderError(format!("{}: {}", status, text)));
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&text)
            .map_err(|e| Error::ProviderError(format!("Invalid response: {}", e)))?;

        let content: String = gemini_response
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .filter_map(|p| match p {
                        Part::Text { text } => Some(text.as_str()),
                        Part::InlineData { .. } => None,
                    })
                    .collect::<String>()
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| Error::ProviderError("Empty response from Gemini".to_string()))?;

        let tokens_used = gemini_response
            .usage_metadata
            .and_then(|u| u.total_token_count)
            .unwrap_or_else(|| approx_tokens(&content));

        Ok(Generation {
            content,
            tokens_used,
        })
    }
}

fn inline_image(image: &str) -> Option<Part> {
    match base64::engine::general_purpose::STANDARD.decode(image.trim()) {
        Ok(_) => Some(Part::InlineData {
            inline_data: InlineData {
                mime_type: "image/jpeg".to_string(),
                data: image.trim().to_string(),
            },
        }),
        Err(err) => {
            warn!("Failed to process image: {}", err);
            None
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "generationConfig")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<u32>,
}
