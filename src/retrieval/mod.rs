//! Retrieval strategies over the selected documents and the web.
//!
//! Three variants share one contract, `search(query, k)`:
//! - `Basic`: inner-product nearest neighbours over document embeddings
//! - `KnowledgeGraph`: Basic ranking plus an entity graph; the graph
//!   re-ranking step is an identity hook for now
//! - `Hybrid`: Basic and web search fetched concurrently; web hits always
//!   rank after every document hit

pub mod embeddings;
pub mod graph;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::models::{RagVariant, RetrievalResult, SearchHit};
use crate::search::SearchClient;

pub use embeddings::{EmbedBackend, EmbeddingService, LocalEmbedder};
pub use graph::{EntityExtractor, KnowledgeGraph};

#[derive(Debug, Clone)]
struct IndexedDocument {
    content: String,
    embedding: Vec<f32>,
}

/// Flat inner-product index over whole documents.
#[derive(Clone)]
pub struct SemanticIndex {
    backend: Arc<EmbedBackend>,
    entries: Vec<IndexedDocument>,
}

impl SemanticIndex {
    pub fn empty(backend: Arc<EmbedBackend>) -> Self {
        Self {
            backend,
            entries: Vec::new(),
        }
    }

    /// Embed `(id, text)` pairs. Blank documents are skipped.
    pub async fn build(backend: Arc<EmbedBackend>, documents: &[(String, String)]) -> Result<Self> {
        let texts: Vec<String> = documents
            .iter()
            .map(|(_, text)| text.clone())
            .filter(|text| !text.trim().is_empty())
            .collect();

        if texts.is_empty() {
            return Ok(Self::empty(backend));
        }

        let embeddings = backend
            .embed(&texts)
            .await
            .context("failed to embed documents")?;

        let entries = texts
            .into_iter()
            .zip(embeddings)
            .map(|(content, embedding)| IndexedDocument { content, embedding })
            .collect();

        Ok(Self { backend, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn try_search(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .backend
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut scored: Vec<RetrievalResult> = self
            .entries
            .iter()
            .map(|entry| {
                RetrievalResult::semantic(
                    entry.content.clone(),
                    embeddings::inner_product(&query_embedding, &entry.embedding),
                )
            })
            .collect();

        sort_by_score(&mut scored);
        scored.truncate(k);
        Ok(scored)
    }

    /// Top `k` documents by similarity. Failures are logged and yield nothing.
    pub async fn search(&self, query: &str, k: usize) -> Vec<RetrievalResult> {
        match self.try_search(query, k).await {
            Ok(results) => results,
            Err(err) => {
                error!("Semantic search error: {:#}", err);
                Vec::new()
            }
        }
    }
}

/// Basic ranking plus an entity graph built at load time.
#[derive(Clone)]
pub struct GraphRetriever {
    index: SemanticIndex,
    graph: KnowledgeGraph,
    extractor: EntityExtractor,
}

impl GraphRetriever {
    pub fn new(index: SemanticIndex, documents: &[(String, String)]) -> Self {
        let extractor = EntityExtractor::new();
        let graph = KnowledgeGraph::build(&extractor, documents);
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Built knowledge graph from documents"
        );
        Self {
            index,
            graph,
            extractor,
        }
    }

    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    /// Graph-aware re-ranking hook. Keeps the semantic order unchanged.
    pub fn rerank(&self, query: &str, results: Vec<RetrievalResult>) -> Vec<RetrievalResult> {
        let entities = self.extractor.keywords(query);
        debug!(
            query_entities = entities.len(),
            "Knowledge graph re-ranking (pass-through)"
        );
        results
    }

    pub async fn search(&self, query: &str, k: usize) -> Vec<RetrievalResult> {
        let results = self.index.search(query, k).await;
        self.rerank(query, results)
    }
}

/// Document hits first, then web hits.
#[derive(Clone)]
pub struct HybridRetriever {
    index: SemanticIndex,
    search: Arc<dyn SearchClient>,
}

impl HybridRetriever {
    pub fn new(index: SemanticIndex, search: Arc<dyn SearchClient>) -> Self {
        Self { index, search }
    }

    pub async fn search(&self, query: &str, k: usize) -> Vec<RetrievalResult> {
        info!("Performing hybrid search for: {}", query);
        let (semantic, web) = futures::join!(self.index.search(query, k), self.search.search(query));
        info!(
            "Hybrid search returned {} semantic and {} internet results",
            semantic.len(),
            web.len()
        );
        merge_hybrid(semantic, web, k)
    }
}

/// Sort document hits by score, append every web hit after them, keep `k`.
pub fn merge_hybrid(
    mut semantic: Vec<RetrievalResult>,
    web: Vec<SearchHit>,
    k: usize,
) -> Vec<RetrievalResult> {
    sort_by_score(&mut semantic);
    semantic
        .into_iter()
        .chain(web.into_iter().map(RetrievalResult::from))
        .take(k)
        .collect()
}

fn sort_by_score(results: &mut [RetrievalResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[derive(Clone)]
pub enum RetrievalStrategy {
    Basic(SemanticIndex),
    KnowledgeGraph(GraphRetriever),
    Hybrid(HybridRetriever),
}

impl RetrievalStrategy {
    /// Build the strategy for `variant` over the given documents.
    ///
    /// Hybrid without a search client falls back to Basic. An embedding
    /// failure leaves the strategy with an empty index.
    pub async fn build(
        variant: RagVariant,
        backend: Arc<EmbedBackend>,
        documents: &[(String, String)],
        search: Option<Arc<dyn SearchClient>>,
    ) -> Self {
        info!("Creating RAG variant: {}", variant);

        let index = match SemanticIndex::build(Arc::clone(&backend), documents).await {
            Ok(index) => index,
            Err(err) => {
                error!("Loading documents failed: {:#}", err);
                SemanticIndex::empty(backend)
            }
        };
        debug!("Indexed {} documents", index.len());

        match (variant, search) {
            (RagVariant::Basic, _) => RetrievalStrategy::Basic(index),
            (RagVariant::KnowledgeGraph, _) => {
                RetrievalStrategy::KnowledgeGraph(GraphRetriever::new(index, documents))
            }
            (RagVariant::Hybrid, Some(search)) => {
                RetrievalStrategy::Hybrid(HybridRetriever::new(index, search))
            }
            (RagVariant::Hybrid, None) => {
                warn!("No search service provided for hybrid RAG, falling back to basic");
                RetrievalStrategy::Basic(index)
            }
        }
    }

    pub fn variant(&self) -> RagVariant {
        match self {
            RetrievalStrategy::Basic(_) => RagVariant::Basic,
            RetrievalStrategy::KnowledgeGraph(_) => RagVariant::KnowledgeGraph,
            RetrievalStrategy::Hybrid(_) => RagVariant::Hybrid,
        }
    }

    pub async fn search(&self, query: &str, k: usize) -> Vec<RetrievalResult> {
        let results = match self {
            RetrievalStrategy::Basic(index) => index.search(query, k).await,
            RetrievalStrategy::KnowledgeGraph(retriever) => retriever.search(query, k).await,
            RetrievalStrategy::Hybrid(retriever) => retriever.search(query, k).await,
        };
        debug!("RAG search returned {} results", results.len());
        results
    }
}
