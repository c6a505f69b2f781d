//! Retrieval-augmented chatbot pipeline
//!
//! This library provides:
//! - Request guardrails (toxicity, NSFW, document relevance)
//! - Bounded per-session conversation memory
//! - Pluggable retrieval over documents and web search (basic, knowledge graph, hybrid)
//! - Routing to Gemini, Groq and Cohere text generation
//! - An orchestrator that runs one chat turn end to end

pub mod commands;
pub mod config;
pub mod documents;
pub mod error;
pub mod guardrails;
pub mod memory;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod retrieval;
pub mod search;

// Re-export common types
pub use config::Settings;
pub use documents::DocumentStore;
pub use error::{Error, Result};
pub use guardrails::{GuardrailService, GuardrailVerdict, RejectionReason};
pub use memory::{ConversationMemory, Message, Role};
pub use models::{ChatConfig, ChatRequest, ChatResponse, RagVariant, RetrievalResult};
pub use orchestrator::Orchestrator;
pub use providers::{Generation, Provider, ProviderRouter};
pub use retrieval::RetrievalStrategy;
pub use search::{SearchClient, SerperClient};
