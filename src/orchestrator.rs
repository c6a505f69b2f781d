//! One chat turn, end to end.
//!
//! The active configuration and its retrieval strategy live together in an
//! immutable snapshot. A request clones the snapshot `Arc` once and uses it
//! throughout, so a concurrent `update_config` never mixes two
//! configurations within a single turn.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::documents::DocumentStore;
use crate::guardrails::GuardrailService;
use crate::memory::{ConversationMemory, Message, Role};
use crate::metrics;
use crate::models::{ChatConfig, ChatRequest, ChatResponse, DocumentInfo, HealthStatus, RagVariant};
use crate::providers::ProviderRouter;
use crate::retrieval::{EmbedBackend, RetrievalStrategy, SemanticIndex};
use crate::search::{self, SearchClient};
use crate::{Error, Result};

/// Configuration snapshot with the strategy built for it.
pub struct ActiveState {
    pub config: ChatConfig,
    pub strategy: RetrievalStrategy,
}

pub struct Orchestrator {
    settings: Settings,
    guardrails: GuardrailService,
    memory: ConversationMemory,
    documents: Arc<DocumentStore>,
    router: ProviderRouter,
    search: Option<Arc<dyn SearchClient>>,
    backend: Arc<EmbedBackend>,
    state: RwLock<Arc<ActiveState>>,
}

impl Orchestrator {
    /// Wire every service from settings. Missing keys disable the matching
    /// service instead of failing.
    pub fn new(settings: Settings) -> Self {
        let backend = Arc::new(EmbedBackend::from_api_key(
            settings.openai_api_key.as_deref(),
        ));
        let search = search::from_api_key(settings.serper_api_key.as_deref())
            .map(|client| Arc::new(client) as Arc<dyn SearchClient>);
        let state = RwLock::new(initial_state(&settings, &backend));

        Self {
            guardrails: GuardrailService::from_settings(&settings),
            memory: ConversationMemory::new(settings.max_messages),
            documents: Arc::new(DocumentStore::new(settings.max_file_size)),
            router: ProviderRouter::from_settings(&settings),
            search,
            backend,
            state,
            settings,
        }
    }

    pub fn with_router(mut self, router: ProviderRouter) -> Self {
        self.router = router;
        self
    }

    pub fn with_guardrails(mut self, guardrails: GuardrailService) -> Self {
        self.guardrails = guardrails;
        self
    }

    pub fn with_search(mut self, search: Option<Arc<dyn SearchClient>>) -> Self {
        self.search = search;
        self
    }

    pub fn with_documents(mut self, documents: Arc<DocumentStore>) -> Self {
        self.documents = documents;
        self
    }

    /// Replace the embedding backend. Resets the active retrieval index.
    pub fn with_embeddings(mut self, backend: EmbedBackend) -> Self {
        self.backend = Arc::new(backend);
        self.state = RwLock::new(initial_state(&self.settings, &self.backend));
        self
    }

    fn snapshot(&self) -> Arc<ActiveState> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Run one chat turn.
    ///
    /// A rejected request touches neither memory, retrieval nor the
    /// provider. Otherwise both the user and the assistant message are
    /// remembered, even when generation degraded to an error message.
    pub async fn chat(&self, request: ChatRequest) -> ChatResponse {
        let state = self.snapshot();
        let session_id = request.session_id.as_str();
        let images = request.images.as_deref().unwrap_or_default();
        info!(
            session = session_id,
            "Chat request received: {}",
            request.message.chars().take(100).collect::<String>()
        );

        let document_context = request
            .document_ids
            .as_deref()
            .map(|ids| self.documents.get_content(ids))
            .unwrap_or_default();
        if !document_context.is_empty() {
            info!("Using {} document contexts", document_context.len());
        }

        let verdict = self
            .guardrails
            .validate(&request.message, images, &document_context)
            .await;

        if let Some(reason) = verdict.rejection_reason {
            warn!(session = session_id, "Request rejected: {}", reason);
            metrics::record_chat_outcome("rejected");
            return ChatResponse {
                response: format!("Request rejected: {}", reason),
                sources: Vec::new(),
                session_id: request.session_id.clone(),
                tokens_used: 0,
                is_relevant: verdict.is_relevant,
                rejection_reason: Some(reason.to_string()),
            };
        }

        self.memory
            .append(session_id, Role::User, &request.message, &document_context);
        let context = self
            .memory
            .context_string(session_id, self.settings.context_messages);
        debug!("Conversation context length: {} characters", context.len());

        let sources = if state.config.wants_retrieval() {
            let results = state
                .strategy
                .search(&request.message, self.settings.retrieval_top_k)
                .await;
            metrics::record_retrieval(state.strategy.variant().as_str(), results.len());
            info!("RAG search returned {} results", results.len());
            results
        } else {
            Vec::new()
        };

        let prompt_documents: Vec<String> = document_context
            .iter()
            .cloned()
            .chain(sources.iter().map(|r| r.content.clone()))
            .collect();

        let generation = self
            .router
            .generate(
                &state.config.selected_llm,
                &request.message,
                images,
                &context,
                &prompt_documents,
            )
            .await;

        self.memory.append(
            session_id,
            Role::Assistant,
            generation.content.as_str(),
            &document_context,
        );

        metrics::record_chat_outcome("answered");
        info!(
            session = session_id,
            tokens = generation.tokens_used,
            "Chat response generated"
        );

        ChatResponse {
            response: generation.content,
            sources,
            session_id: request.session_id,
            tokens_used: generation.tokens_used,
            is_relevant: true,
            rejection_reason: None,
        }
    }

    /// Replace the active configuration and rebuild retrieval over the
    /// newly selected documents. Unknown document ids are ignored.
    pub async fn update_config(&self, config: ChatConfig) {
        let documents = self.documents.get_named_content(&config.selected_documents);
        if documents.len() < config.selected_documents.len() {
            warn!(
                "{} selected documents are unknown and were skipped",
                config.selected_documents.len() - documents.len()
            );
        }

        let strategy = RetrievalStrategy::build(
            config.selected_rag_variant,
            Arc::clone(&self.backend),
            &documents,
            self.search.clone(),
        )
        .await;

        info!(
            "Configuration updated: LLM={}, RAG={}",
            config.selected_llm, config.selected_rag_variant
        );

        let next = Arc::new(ActiveState { config, strategy });
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    pub fn current_config(&self) -> ChatConfig {
        self.snapshot().config.clone()
    }

    /// Variant actually serving retrieval; may differ from the configured one
    /// after a fallback.
    pub fn active_variant(&self) -> RagVariant {
        self.snapshot().strategy.variant()
    }

    pub fn history(&self, session_id: &str) -> Vec<Message> {
        self.memory.history(session_id)
    }

    pub fn clear_memory(&self, session_id: &str) {
        self.memory.clear(session_id);
    }

    pub fn documents(&self) -> &Arc<DocumentStore> {
        &self.documents
    }

    pub fn upload_document(&self, filename: &str, bytes: &[u8]) -> Result<DocumentInfo> {
        self.documents.add(filename, bytes)
    }

    /// Remove a document. If the active configuration selects it, the
    /// selection drops the id and retrieval is rebuilt without its text.
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        if !self.documents.delete(id) {
            return Err(Error::DocumentNotFound(id.to_string()));
        }

        let mut config = self.current_config();
        if config.selected_documents.iter().any(|selected| selected == id) {
            config.selected_documents.retain(|selected| selected != id);
            info!("Deleted document {} was selected; rebuilding retrieval", id);
            self.update_config(config).await;
        }
        Ok(())
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy",
            llm_available: self.router.is_configured(),
        }
    }

    pub fn available_llms(&self) -> Vec<String> {
        self.router.available_llms()
    }

    pub fn rag_variants(&self) -> Vec<String> {
        self.settings.rag_variants()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

fn initial_state(settings: &Settings, backend: &Arc<EmbedBackend>) -> Arc<ActiveState> {
    Arc::new(ActiveState {
        config: ChatConfig::new(settings.default_llm()),
        strategy: RetrievalStrategy::Basic(SemanticIndex::empty(Arc::clone(backend))),
    })
}
