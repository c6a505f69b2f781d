//! Embedding backends: OpenAI when a key is configured, local hashing otherwise.

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::{CreateEmbeddingRequestArgs, EmbeddingInput},
    Client as OpenAIClient,
};
use tracing::{debug, info, warn};

/// Dimension of the local embedder (same as all-MiniLM-L6-v2).
pub const LOCAL_EMBEDDING_DIM: usize = 384;
const MAX_EMBED_CHARS: usize = 8000;

/// Service for generating text embeddings
#[derive(Clone)]
pub struct EmbeddingService {
    client: OpenAIClient<OpenAIConfig>,
    model: String,
}

impl EmbeddingService {
    pub fn new(api_key: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            anyhow::bail!("OPENAI_API_KEY is empty");
        }

        let config = OpenAIConfig::new().with_api_key(api_key);
        Ok(Self {
            client: OpenAIClient::with_config(config),
            model: "text-embedding-3-small".to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Generate embeddings for multiple texts in batch
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let processed: Vec<String> = texts
            .iter()
            .map(|t| t.trim().chars().take(MAX_EMBED_CHARS).collect::<String>())
            .filter(|t| !t.is_empty())
            .collect();

        if processed.is_empty() {
            return Ok(vec![Vec::new(); texts.len()]);
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::StringArray(processed))
            .build()?;

        let response = self.client.embeddings().create(request).await?;

        info!(
            "Generated {} embeddings, tokens used: {}",
            response.data.len(),
            response.usage.total_tokens
        );

        // Empty inputs were not sent; give them empty vectors in place
        let mut result = Vec::with_capacity(texts.len());
        let mut embed_iter = response.data.into_iter();

        for text in texts {
            if text.trim().is_empty() {
                result.push(Vec::new());
            } else if let Some(embed) = embed_iter.next() {
                result.push(embed.embedding);
            }
        }

        Ok(result)
    }

    pub fn dimension(&self) -> usize {
        match self.model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        }
    }
}

/// Deterministic hashed bag-of-words embedding for offline use.
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dim: usize,
}

impl LocalEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut vec = vec![0.0f32; self.dim];
        for token in text.split_whitespace() {
            let token = token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if token.is_empty() {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.dim;
            vec[idx] += 1.0;
        }

        normalize(&mut vec);
        vec
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }
}

#[allow(clippy::large_enum_variant)]
#[derive(Clone)]
pub enum EmbedBackend {
    OpenAI(EmbeddingService),
    Local(LocalEmbedder),
}

impl EmbedBackend {
    /// OpenAI embeddings if a key is given, otherwise local.
    pub fn from_api_key(api_key: Option<&str>) -> Self {
        match api_key.map(EmbeddingService::new) {
            Some(Ok(service)) => {
                info!("Embeddings: using OpenAI");
                EmbedBackend::OpenAI(service)
            }
            Some(Err(err)) => {
                warn!("Embeddings: falling back to local embedder ({err})");
                Self::local()
            }
            None => {
                info!("Embeddings: using local embedder");
                Self::local()
            }
        }
    }

    pub fn local() -> Self {
        EmbedBackend::Local(LocalEmbedder::new(LOCAL_EMBEDDING_DIM))
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self {
            EmbedBackend::OpenAI(service) => service.embed_batch(texts).await,
            EmbedBackend::Local(local) => Ok(texts.iter().map(|t| local.embed(t)).collect()),
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            EmbedBackend::OpenAI(service) => service.dimension(),
            EmbedBackend::Local(local) => local.dimension(),
        }
    }
}

pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}
