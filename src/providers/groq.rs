//! Groq client over the OpenAI-compatible chat completions API.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{approx_tokens, Generation};
use crate::{Error, Result};

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1";

/// Served for empty or unlisted model names.
pub const DEFAULT_MODEL: &str = "llama3-8b-8192";

/// Display name → Groq model id.
const MODEL_MAP: &[(&str, &str)] = &[
    ("llama-3.1-8b-instant", "llama3-8b-8192"),
    ("gemma2-9b-it", "gemma2-9b-it"),
    ("mixtral-8x7b-32768", "mixtral-8x7b-32768"),
];

#[derive(Debug, Clone)]
pub struct GroqClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl GroqClient {
    pub fn new<S: Into<String>>(api_key: S) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::InvalidArgument("GROQ_API_KEY is empty".to_string()));
        }

        let http = Client::builder()
            .user_agent("rag_chatbot/0.1.0")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::InvalidArgument(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: GROQ_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn resolve_model(model: &str) -> &'static str {
        MODEL_MAP
            .iter()
            .find(|(name, _)| *name == model)
            .map(|(_, id)| *id)
            .unwrap_or(DEFAULT_MODEL)
    }

    /// Text-only: none of the served models accept images.
    pub async fn generate(&self, model: &str, prompt: &str) -> Result<Generation> {
        let request = CompletionRequest {
            model: Self::resolve_model(model),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.7,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
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

        let completion: CompletionResponse = serde_json::from_str(&text)
            .map_err(|e| Error::ProviderError(format!("Invalid response: {}", e)))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::ProviderError("Empty response from Groq".to_string()))?;

        let tokens_used = completion
            .usage
            .map(|u| u.total_tokens)
            .unwrap_or_else(|| approx_tokens(&content));

        Ok(Generation {
            content,
            tokens_used,
        })
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}
