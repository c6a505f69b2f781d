//! Internet search used by hybrid retrieval.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::models::SearchHit;
use crate::{Error, Result};

const SERPER_API_URL: &str = "https://google.serper.dev";
/// Results requested from (and kept from) a search call.
pub const MAX_SEARCH_RESULTS: usize = 5;

/// Web search backend. Implementations never fail: errors yield no hits.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, query: &str) -> Vec<SearchHit>;
}

/// Serper (Google search) client.
#[derive(Debug, Clone)]
pub struct SerperClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl SerperClient {
    pub fn new<S: Into<String>>(api_key: S) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::InvalidArgument("SERPER_API_KEY is empty".to_string()));
        }

        let http = Client::builder()
            .user_agent("rag_chatbot/0.1.0")
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::InvalidArgument(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: SERPER_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn try_search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .header("X-API-KEY", &self.api_key)
            .json(&SerperRequest {
                q: query,
                num: MAX_SEARCH_RESULTS,
            })
            .send()
            .await
            .map_err(|e| Error::SearchError(format!("request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::SearchError(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::SearchError(format!("Serper error {}: {}", status, text)));
        }

        let parsed: SerperResponse = serde_json::from_str(&text)
            .map_err(|e| Error::SearchError(format!("Invalid response: {}", e)))?;

        Ok(parsed
            .organic
            .into_iter()
            .take(MAX_SEARCH_RESULTS)
            .map(|item| SearchHit {
                title: item.title,
                snippet: item.snippet,
                link: item.link,
            })
            .collect())
    }
}

#[async_trait]
impl SearchClient for SerperClient {
    async fn search(&self, query: &str) -> Vec<SearchHit> {
        info!("Performing internet search for: {}", query);
        match self.try_search(query).await {
            Ok(hits) => {
                info!("Internet search returned {} results", hits.len());
                hits
            }
            Err(err) => {
                error!("Internet search failed: {}", err);
                Vec::new()
            }
        }
    }
}

/// Build the configured search client, if any.
pub fn from_api_key(api_key: Option<&str>) -> Option<SerperClient> {
    match api_key.map(SerperClient::new) {
        Some(Ok(client)) => {
            info!("Serper API key found - internet search enabled");
            Some(client)
        }
        Some(Err(err)) => {
            warn!("Internet search disabled: {}", err);
            None
        }
        None => {
            warn!("Serper API key not found - internet search disabled");
            None
        }
    }
}

#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}
