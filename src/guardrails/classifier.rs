//! Toxicity classifier backends.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const HF_INFERENCE_URL: &str = "https://api-inference.huggingface.co";
pub const TOXICITY_MODEL: &str = "unitary/toxic-bert";

/// Label with its classifier score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Text classifier used by the toxicity check.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>>;
}

/// Hugging Face Inference API client.
#[derive(Debug, Clone)]
pub struct HuggingFaceClassifier {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl HuggingFaceClassifier {
    pub fn new<S: Into<String>>(api_key: S) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::InvalidArgument("HF_API_KEY is empty".to_string()));
        }

        let http = Client::builder()
            .user_agent("rag_chatbot/0.1.0")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::InvalidArgument(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: HF_INFERENCE_URL.to_string(),
            model: TOXICITY_MODEL.to_string(),
        })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Classifier for HuggingFaceClassifier {
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>> {
        let response = self
            .http
            .post(format!("{}/models/{}", self.base_url, self.model))
            .bearer_auth(&self.api_key)
            .json(&ClassifyRequest { inputs: text })
            .send()
            .await
            .map_err(|e| Error::ClassifierError(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::ClassifierError(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::ClassifierError(format!(
                "Classifier error {}: {}",
                status, body
            )));
        }

        let parsed: ClassifyResponse = serde_json::from_str(&body)
            .map_err(|e| Error::ClassifierError(format!("Invalid response: {}", e)))?;

        Ok(match parsed {
            ClassifyResponse::Nested(batches) => batches.into_iter().flatten().collect(),
            ClassifyResponse::Flat(labels) => labels,
        })
    }
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassifyResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}
