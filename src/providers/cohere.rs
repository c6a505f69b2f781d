//! Cohere v2 chat client.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{approx_tokens, Generation};
use crate::{Error, Result};

const COHERE_API_URL: &str = "https://api.cohere.com";

pub const DEFAULT_MODEL: &str = "command-r-plus";
pub const VISION_MODEL: &str = "command-a-vision-07-2025";

/// Models this client will request; anything else maps to [`DEFAULT_MODEL`].
pub const COHERE_MODELS: &[&str] = &[
    DEFAULT_MODEL,
    "command-r-plus-08-2024",
    "command-r",
    "command-a-03-2025",
    VISION_MODEL,
];

#[derive(Debug, Clone)]
pub struct CohereClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl CohereClient {
    pub fn new<S: Into<String>>(api_key: S) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::InvalidArgument("COHERE_API_KEY is empty".to_string()));
        }

        let http = Client::builder()
            .user_agent("rag_chatbot/0.1.0")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::InvalidArgument(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: COHERE_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn resolve_model(model: &str) -> &'static str {
        COHERE_MODELS
            .iter()
            .copied()
            .find(|known| *known == model)
            .unwrap_or(DEFAULT_MODEL)
    }

    /// Images are sent as data URIs, and only to the vision model.
    pub async fn generate(&self, model: &str, prompt: &str, images: &[String]) -> Result<Generation> {
        let model = Self::resolve_model(model);

        let content = if model == VISION_MODEL && !images.is_empty() {
            let mut parts = vec![ContentPart::Text {
                text: prompt.to_string(),
            }];
            parts.extend(images.iter().map(|image| ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:image/jpeg;base64,{}", image.trim()),
                },
            }));
            MessageContent::Parts(parts)
        } else {
            MessageContent::Text(prompt.to_string())
        };

        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
        };

        let response = self
            .http
            .post(format!("{}/v2/chat", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
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

        let chat: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| Error::ProviderError(format!("Invalid response: {}", e)))?;

        let content: String = chat
            .message
            .content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect();
        if content.is_empty() {
            return Err(Error::ProviderError("Empty response from Cohere".to_string()));
        }

        let tokens_used = chat
            .usage
            .and_then(|u| u.tokens)
            .map(|t| (t.input_tokens + t.output_tokens).round() as u32)
            .unwrap_or_else(|| approx_tokens(&content));

        Ok(Generation {
            content,
            tokens_used,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: AssistantMessage,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    tokens: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct TokenUsage {
    #[serde(default)]
    input_tokens: f64,
    #[serde(default)]
    output_tokens: f64,
}
