//! Shared setup for commands that talk to the orchestrator.

use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::Engine;
use tracing::info;

use crate::config::Settings;
use crate::models::{ChatConfig, ChatRequest, ChatResponse, RagVariant, ResultSource};
use crate::orchestrator::Orchestrator;

/// Options shared by `ask` and `chat`.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// `provider:model`; the first available model when unset
    pub llm: Option<String>,
    pub rag: String,
    /// Directory of .txt/.md files to load and select
    pub docs: Option<PathBuf>,
    /// Attach the loaded documents to every request as well
    pub attach: bool,
    pub search: bool,
    pub session: String,
    pub images: Vec<PathBuf>,
}

/// A ready orchestrator plus the ids of the documents it loaded.
pub struct Session {
    pub orchestrator: Orchestrator,
    pub document_ids: Vec<String>,
    pub images: Vec<String>,
    pub options: SessionOptions,
}

impl Session {
    pub async fn start(options: SessionOptions) -> Result<Self> {
        let orchestrator = Orchestrator::new(Settings::new());

        let document_ids = match &options.docs {
            Some(dir) => orchestrator
                .documents()
                .load_dir(dir)
                .with_context(|| format!("failed to load documents from {}", dir.display()))?
                .into_iter()
                .map(|doc| doc.id)
                .collect(),
            None => Vec::new(),
        };
        info!("Loaded {} documents", document_ids.len());

        let images = options
            .images
            .iter()
            .map(|path| {
                std::fs::read(path)
                    .map(|bytes| base64::engine::general_purpose::STANDARD.encode(bytes))
                    .with_context(|| format!("failed to read image {}", path.display()))
            })
            .collect::<Result<Vec<_>>>()?;

        let config = ChatConfig {
            selected_llm: options
                .llm
                .clone()
                .unwrap_or_else(|| orchestrator.settings().default_llm()),
            selected_rag_variant: RagVariant::parse(&options.rag),
            selected_documents: document_ids.clone(),
            enable_internet_search: options.search,
        };
        orchestrator.update_config(config).await;

        Ok(Self {
            orchestrator,
            document_ids,
            images,
            options,
        })
    }

    pub fn request(&self, message: &str) -> ChatRequest {
        let mut request = ChatRequest::new(self.options.session.clone(), message);
        if self.options.attach && !self.document_ids.is_empty() {
            request = request.with_documents(self.document_ids.clone());
        }
        if !self.images.is_empty() {
            request = request.with_images(self.images.clone());
        }
        request
    }

    pub async fn send(&self, message: &str) -> ChatResponse {
        self.orchestrator.chat(self.request(message)).await
    }
}

/// Render a response for the terminal.
pub fn format_response(response: &ChatResponse) -> String {
    let mut out = response.response.clone();

    if !response.sources.is_empty() {
        out.push_str("\n\nSources:");
        for (i, source) in response.sources.iter().enumerate() {
            let label = match source.source {
                ResultSource::Document => format!("document, score {:.3}", source.score),
                ResultSource::Internet => source
                    .link
                    .clone()
                    .filter(|link| !link.is_empty())
                    .unwrap_or_else(|| "internet".to_string()),
            };
            let preview: String = source.content.chars().take(80).collect();
            out.push_str(&format!("\n  {}. [{}] {}", i + 1, label, preview));
        }
    }

    if response.tokens_used > 0 {
        out.push_str(&format!("\n\n({} tokens)", response.tokens_used));
    }
    out
}
