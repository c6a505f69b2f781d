//! Request, response and configuration shapes exchanged with callers.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Retrieval variant selected in the active configuration.
///
/// Parsing never fails: an unrecognized tag maps to [`RagVariant::Basic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RagVariant {
    #[default]
    Basic,
    KnowledgeGraph,
    Hybrid,
}

impl RagVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            RagVariant::Basic => "basic",
            RagVariant::KnowledgeGraph => "knowledge_graph",
            RagVariant::Hybrid => "hybrid",
        }
    }

    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "basic" => RagVariant::Basic,
            "knowledge_graph" | "knowledge-graph" | "kg" => RagVariant::KnowledgeGraph,
            "hybrid" => RagVariant::Hybrid,
            other => {
                warn!("Unknown RAG variant '{}', falling back to basic", other);
                RagVariant::Basic
            }
        }
    }
}

impl From<String> for RagVariant {
    fn from(tag: String) -> Self {
        RagVariant::parse(&tag)
    }
}

impl From<RagVariant> for String {
    fn from(variant: RagVariant) -> Self {
        variant.as_str().to_string()
    }
}

impl fmt::Display for RagVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Active chat configuration. Always replaced as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    pub selected_llm: String,
    pub selected_rag_variant: RagVariant,
    #[serde(default)]
    pub selected_documents: Vec<String>,
    #[serde(default)]
    pub enable_internet_search: bool,
}

impl ChatConfig {
    pub fn new(selected_llm: impl Into<String>) -> Self {
        Self {
            selected_llm: selected_llm.into(),
            selected_rag_variant: RagVariant::Basic,
            selected_documents: Vec::new(),
            enable_internet_search: false,
        }
    }

    /// Retrieval only runs when there is something to retrieve from.
    pub fn wants_retrieval(&self) -> bool {
        !self.selected_documents.is_empty() || self.enable_internet_search
    }
}

/// Incoming chat turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Base64 encoded images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_ids: Option<Vec<String>>,
}

impl ChatRequest {
    pub fn new(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            images: None,
            session_id: session_id.into(),
            document_ids: None,
        }
    }

    pub fn with_documents(mut self, ids: Vec<String>) -> Self {
        self.document_ids = Some(ids);
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = Some(images);
        self
    }
}

/// Answer (or refusal) for one chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub sources: Vec<RetrievalResult>,
    pub session_id: String,
    pub tokens_used: u32,
    pub is_relevant: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl ChatResponse {
    pub fn is_rejected(&self) -> bool {
        self.rejection_reason.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Document,
    Internet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Semantic,
    SearchResult,
}

/// One ranked context snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub content: String,
    pub score: f32,
    pub source: ResultSource,
    #[serde(rename = "type")]
    pub kind: ResultKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl RetrievalResult {
    pub fn semantic(content: impl Into<String>, score: f32) -> Self {
        Self {
            content: content.into(),
            score,
            source: ResultSource::Document,
            kind: ResultKind::Semantic,
            title: None,
            link: None,
        }
    }
}

/// Web search hit as returned by a search client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub link: String,
}

impl From<SearchHit> for RetrievalResult {
    fn from(hit: SearchHit) -> Self {
        let content = if hit.title.is_empty() {
            hit.snippet
        } else {
            format!("{}: {}", hit.title, hit.snippet)
        };
        Self {
            content,
            score: 0.0,
            source: ResultSource::Internet,
            kind: ResultKind::SearchResult,
            title: Some(hit.title),
            link: Some(hit.link),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Txt,
    Md,
}

impl DocumentType {
    pub fn from_filename(name: &str) -> Option<Self> {
        let ext = name.rsplit_once('.')?.1.to_lowercase();
        match ext.as_str() {
            "txt" => Some(DocumentType::Txt),
            "md" | "markdown" => Some(DocumentType::Md),
            _ => None,
        }
    }
}

/// Metadata about an uploaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub upload_time: String,
    pub size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_summary: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub llm_available: bool,
}
