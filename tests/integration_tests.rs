//! Integration tests for the rag_chatbot library
//!
//! These tests drive the public API end to end, with every external HTTP
//! service replaced by a local mock server.

use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::json;
use tempfile::tempdir;

use rag_chatbot::guardrails::HuggingFaceClassifier;
use rag_chatbot::models::{ResultKind, ResultSource};
use rag_chatbot::providers::{CohereClient, GeminiClient};
use rag_chatbot::{
    ChatConfig, ChatRequest, GuardrailService, Orchestrator, ProviderRouter, RagVariant, Role,
    SearchClient, SerperClient, Settings,
};

fn offline_settings() -> Settings {
    let mut settings = Settings::defaults();
    settings.gemini_api_key = None;
    settings.groq_api_key = None;
    settings.cohere_api_key = None;
    settings.serper_api_key = None;
    settings.huggingface_api_key = None;
    settings.openai_api_key = None;
    settings
}

fn gemini_reply(text: &str, tokens: u32) -> serde_json::Value {
    json!({
        "candidates": [ { "content": { "role": "model", "parts": [ { "text": text } ] } } ],
        "usageMetadata": { "totalTokenCount": tokens }
    })
}

// ============================================================================
// Full pipeline
// ============================================================================

#[tokio::test]
async fn hybrid_turn_uses_documents_web_and_memory() {
    let server = MockServer::start_async().await;

    let search_mock = server.mock(|when, then| {
        when.method(POST).path("/search").header("X-API-KEY", "serper");
        then.status(200).json_body(json!({
            "organic": [
                { "title": "Tokio", "snippet": "An async runtime", "link": "https://tokio.rs" },
                { "title": "Rust", "snippet": "A language", "link": "https://rust-lang.org" },
                { "title": "Crates", "snippet": "Registry", "link": "https://crates.io" }
            ]
        }));
    });
    let gemini_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/models/gemini-2.0-flash:generateContent")
            .is_true(|req| {
                let body = String::from_utf8_lossy(req.body().as_ref());
                body.contains("Document 1: tokio schedules async tasks on worker threads")
                    && body.contains("Tokio: An async runtime")
            });
        then.status(200)
            .json_body(gemini_reply("Tokio uses a work-stealing scheduler.", 33));
    });

    let search: Arc<dyn SearchClient> = Arc::new(
        SerperClient::new("serper")
            .unwrap()
            .with_base_url(&server.base_url()),
    );
    let orchestrator = Orchestrator::new(offline_settings())
        .with_search(Some(search))
        .with_router(
            ProviderRouter::new().with_gemini(
                GeminiClient::new("gem")
                    .unwrap()
                    .with_base_url(&server.base_url()),
            ),
        );

    let doc = orchestrator
        .upload_document(
            "tokio.txt",
            b"tokio schedules async tasks on worker threads",
        )
        .unwrap();

    orchestrator
        .update_config(ChatConfig {
            selected_llm: "gemini:gemini-2.0-flash".into(),
            selected_rag_variant: RagVariant::Hybrid,
            selected_documents: vec![doc.id.clone()],
            enable_internet_search: true,
        })
        .await;

    let response = orchestrator
        .chat(ChatRequest::new("it-1", "How does tokio schedule tasks?"))
        .await;

    assert_eq!(response.response, "Tokio uses a work-stealing scheduler.");
    assert_eq!(response.tokens_used, 33);
    assert_eq!(response.session_id, "it-1");

    // k = 3: one document hit, then the first two web hits
    assert_eq!(response.sources.len(), 3);
    assert_eq!(response.sources[0].source, ResultSource::Document);
    assert_eq!(response.sources[1].kind, ResultKind::SearchResult);
    assert_eq!(response.sources[1].link.as_deref(), Some("https://tokio.rs"));
    assert_eq!(response.sources[2].title.as_deref(), Some("Rust"));

    let history = orchestrator.history("it-1");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].role, Role::Assistant);

    search_mock.assert_calls(1);
    gemini_mock.assert_calls(1);
}

#[tokio::test]
async fn second_turn_carries_conversation_context() {
    let server = MockServer::start_async().await;

    let first = server.mock(|when, then| {
        when.method(POST).path("/v2/chat").is_true(|req| {
            !String::from_utf8_lossy(req.body().as_ref()).contains("Assistant:")
        });
        then.status(200).json_body(json!({
            "message": { "role": "assistant", "content": [ { "type": "text", "text": "Nice to meet you, Sam." } ] }
        }));
    });
    let second = server.mock(|when, then| {
        when.method(POST).path("/v2/chat").is_true(|req| {
            String::from_utf8_lossy(req.body().as_ref())
                .contains("Assistant: Nice to meet you, Sam.")
        });
        then.status(200).json_body(json!({
            "message": { "role": "assistant", "content": [ { "type": "text", "text": "Your name is Sam." } ] }
        }));
    });

    let orchestrator = Orchestrator::new(offline_settings()).with_router(
        ProviderRouter::new().with_cohere(
            CohereClient::new("co")
                .unwrap()
                .with_base_url(&server.base_url()),
        ),
    );
    orchestrator.update_config(ChatConfig::new("cohere")).await;

    orchestrator
        .chat(ChatRequest::new("sam", "Hi, my name is Sam"))
        .await;
    let response = orchestrator
        .chat(ChatRequest::new("sam", "What is my name?"))
        .await;

    assert_eq!(response.response, "Your name is Sam.");
    assert_eq!(orchestrator.history("sam").len(), 4);
    first.assert_calls(1);
    second.assert_calls(1);
}

// ============================================================================
// Guardrails
// ============================================================================

#[tokio::test]
async fn toxic_message_is_rejected_before_generation() {
    let server = MockServer::start_async().await;

    let classifier_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/models/unitary/toxic-bert")
            .header("Authorization", "Bearer hf");
        then.status(200).json_body(json!([[
            { "label": "toxic", "score": 0.93 },
            { "label": "insult", "score": 0.41 }
        ]]));
    });
    let gemini_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/models/gemini-2.0-flash:generateContent");
        then.status(200).json_body(gemini_reply("never", 1));
    });

    let classifier = HuggingFaceClassifier::new("hf")
        .unwrap()
        .with_base_url(&server.base_url());
    let orchestrator = Orchestrator::new(offline_settings())
        .with_guardrails(GuardrailService::new(Some(Arc::new(classifier))))
        .with_router(
            ProviderRouter::new().with_gemini(
                GeminiClient::new("gem")
                    .unwrap()
                    .with_base_url(&server.base_url()),
            ),
        );

    let response = orchestrator
        .chat(ChatRequest::new("s", "you are awful"))
        .await;

    assert_eq!(response.response, "Request rejected: Toxic content detected");
    assert!(response.sources.is_empty());
    assert!(orchestrator.history("s").is_empty());
    classifier_mock.assert_calls(1);
    gemini_mock.assert_calls(0);
}

#[tokio::test]
async fn classifier_outage_fails_open() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/models/unitary/toxic-bert");
        then.status(503).body("model loading");
    });

    let classifier = HuggingFaceClassifier::new("hf")
        .unwrap()
        .with_base_url(&server.base_url());
    let orchestrator = Orchestrator::new(offline_settings())
        .with_guardrails(GuardrailService::new(Some(Arc::new(classifier))));

    let response = orchestrator.chat(ChatRequest::new("s", "hello")).await;

    assert!(!response.is_rejected());
    assert_eq!(orchestrator.history("s").len(), 2);
}

// ============================================================================
// Documents and configuration
// ============================================================================

#[tokio::test]
async fn documents_loaded_from_directory_drive_knowledge_graph_retrieval() {
    let dir = tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("rust.md"),
        "Rust guarantees memory safety through Ownership and Borrowing",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("bread.txt"),
        "Sourdough bread needs a starter and patience",
    )
    .unwrap();
    std::fs::write(dir.path().join("scan.pdf"), b"%PDF-1.4").unwrap();

    let orchestrator = Orchestrator::new(offline_settings());
    let loaded = orchestrator.documents().load_dir(dir.path()).unwrap();
    assert_eq!(loaded.len(), 2);

    let mut config = ChatConfig::new("foo:bar");
    config.selected_rag_variant = RagVariant::KnowledgeGraph;
    config.selected_documents = loaded.iter().map(|d| d.id.clone()).collect();
    orchestrator.update_config(config).await;
    assert_eq!(orchestrator.active_variant(), RagVariant::KnowledgeGraph);

    let response = orchestrator
        .chat(ChatRequest::new("s", "how does rust handle memory safety"))
        .await;

    assert_eq!(response.response, "Unsupported LLM provider: foo");
    assert_eq!(response.tokens_used, 0);
    assert_eq!(response.sources.len(), 2);
    assert!(response.sources[0].content.starts_with("Rust guarantees"));
    assert!(response.sources[0].score >= response.sources[1].score);
}

#[tokio::test]
async fn config_round_trips_through_json() {
    let orchestrator = Orchestrator::new(offline_settings());
    let update: ChatConfig = serde_json::from_value(json!({
        "selected_llm": "groq:gemma2-9b-it",
        "selected_rag_variant": "knowledge_graph",
        "selected_documents": ["missing-id"],
        "enable_internet_search": false
    }))
    .unwrap();

    orchestrator.update_config(update.clone()).await;

    let current = orchestrator.current_config();
    assert_eq!(current, update);
    assert_eq!(
        serde_json::to_value(&current).unwrap()["selected_rag_variant"],
        "knowledge_graph"
    );
}

#[tokio::test]
async fn sessions_are_isolated_and_bounded() {
    let mut settings = offline_settings();
    settings.max_messages = 4;
    let orchestrator = Orchestrator::new(settings);

    for i in 0..3 {
        orchestrator
            .chat(ChatRequest::new("a", format!("question {}", i)))
            .await;
    }
    orchestrator.chat(ChatRequest::new("b", "other")).await;

    let a = orchestrator.history("a");
    assert_eq!(a.len(), 4);
    assert_eq!(a[0].content, "question 1");
    assert_eq!(orchestrator.history("b").len(), 2);

    orchestrator.clear_memory("a");
    assert!(orchestrator.history("a").is_empty());
    assert_eq!(orchestrator.history("b").len(), 2);
}
