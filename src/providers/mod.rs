//! Text-generation providers and the router that dispatches to them.
//!
//! The router never fails: a missing key, an unknown provider or a failed
//! call all come back as a [`Generation`] with a readable message and zero
//! tokens.

pub mod cohere;
pub mod gemini;
pub mod groq;
pub mod prompt;

use std::fmt;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::config::{Settings, COHERE_MODELS, GEMINI_MODELS, GROQ_MODELS};
use crate::metrics;
use crate::Error;

pub use cohere::CohereClient;
pub use gemini::GeminiClient;
pub use groq::GroqClient;
pub use prompt::build_prompt;

/// Generated text plus token usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub content: String,
    pub tokens_used: u32,
}

impl Generation {
    fn message(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tokens_used: 0,
        }
    }
}

/// Split `provider:model`. Without a colon the model is empty.
pub fn parse_selector(selector: &str) -> (&str, &str) {
    selector.split_once(':').unwrap_or((selector, ""))
}

/// Whitespace word count, used when a provider reports no usage.
pub fn approx_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Gemini,
    Groq,
    Cohere,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Gemini, Provider::Groq, Provider::Cohere];

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "gemini" => Some(Provider::Gemini),
            "groq" => Some(Provider::Groq),
            "cohere" => Some(Provider::Cohere),
            _ => None,
        }
    }

    /// Selector prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Groq => "groq",
            Provider::Cohere => "cohere",
        }
    }

    /// Name used in user-facing messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Gemini => "Gemini",
            Provider::Groq => "Groq",
            Provider::Cohere => "Cohere",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct ProviderRouter {
    gemini: Option<GeminiClient>,
    groq: Option<GroqClient>,
    cohere: Option<CohereClient>,
    gemini_models: Vec<String>,
    groq_models: Vec<String>,
    cohere_models: Vec<String>,
}

impl Default for ProviderRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRouter {
    /// Router with no configured provider and the built-in model lists.
    pub fn new() -> Self {
        let owned = |models: &[&str]| -> Vec<String> { models.iter().map(|m| m.to_string()).collect() };
        Self {
            gemini: None,
            groq: None,
            cohere: None,
            gemini_models: owned(GEMINI_MODELS),
            groq_models: owned(GROQ_MODELS),
            cohere_models: owned(COHERE_MODELS),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let mut router = Self::new();
        router.gemini_models = settings.gemini_models.clone();
        router.groq_models = settings.groq_models.clone();
        router.cohere_models = settings.cohere_models.clone();

        if let Some(key) = settings.gemini_api_key.as_deref() {
            router.gemini = build_client(Provider::Gemini, GeminiClient::new(key));
        }
        if let Some(key) = settings.groq_api_key.as_deref() {
            router.groq = build_client(Provider::Groq, GroqClient::new(key));
        }
        if let Some(key) = settings.cohere_api_key.as_deref() {
            router.cohere = build_client(Provider::Cohere, CohereClient::new(key));
        }
        router
    }

    pub fn with_gemini(mut self, client: GeminiClient) -> Self {
        self.gemini = Some(client);
        self
    }

    pub fn with_groq(mut self, client: GroqClient) -> Self {
        self.groq = Some(client);
        self
    }

    pub fn with_cohere(mut self, client: CohereClient) -> Self {
        self.cohere = Some(client);
        self
    }

    pub fn provider_configured(&self, provider: Provider) -> bool {
        match provider {
            Provider::Gemini => self.gemini.is_some(),
            Provider::Groq => self.groq.is_some(),
            Provider::Cohere => self.cohere.is_some(),
        }
    }

    /// True if any provider can be called.
    pub fn is_configured(&self) -> bool {
        Provider::ALL.iter().any(|p| self.provider_configured(*p))
    }

    /// `provider:model` for every configured provider.
    pub fn available_llms(&self) -> Vec<String> {
        Provider::ALL
            .iter()
            .filter(|p| self.provider_configured(**p))
            .flat_map(|p| {
                let models = match p {
                    Provider::Gemini => &self.gemini_models,
                    Provider::Groq => &self.groq_models,
                    Provider::Cohere => &self.cohere_models,
                };
                models.iter().map(move |m| format!("{}:{}", p, m))
            })
            .collect()
    }

    /// Assemble the prompt and call the selected provider.
    pub async fn generate(
        &self,
        selector: &str,
        question: &str,
        images: &[String],
        context: &str,
        document_context: &[String],
    ) -> Generation {
        let (name, model) = parse_selector(selector);
        let Some(provider) = Provider::parse(name) else {
            warn!("Unsupported LLM provider requested: {}", name);
            return Generation::message(format!("Unsupported LLM provider: {}", name));
        };

        let full_prompt = build_prompt(question, context, document_context);
        let started = Instant::now();

        let result = match provider {
            Provider::Gemini => match &self.gemini {
                Some(client) => client.generate(model, &full_prompt, images).await,
                None => return not_configured(provider),
            },
            Provider::Groq => match &self.groq {
                Some(client) => client.generate(model, &full_prompt).await,
                None => return not_configured(provider),
            },
            Provider::Cohere => match &self.cohere {
                Some(client) => client.generate(model, &full_prompt, images).await,
                None => return not_configured(provider),
            },
        };

        metrics::record_provider_call(provider.as_str(), started.elapsed(), result.is_ok());

        match result {
            Ok(generation) => {
                info!(
                    provider = provider.as_str(),
                    model,
                    tokens = generation.tokens_used,
                    "Generated response"
                );
                generation
            }
            Err(err) => {
                let detail = match err {
                    Error::ProviderError(detail) => detail,
                    other => other.to_string(),
                };
                error!("{} API error: {}", provider.display_name(), detail);
                Generation::message(format!("{} API error: {}", provider.display_name(), detail))
            }
        }
    }
}

fn build_client<T>(provider: Provider, client: crate::Result<T>) -> Option<T> {
    match client {
        Ok(client) => {
            info!("{} client initialized", provider.display_name());
            Some(client)
        }
        Err(err) => {
            error!("Failed to initialize {} client: {}", provider.display_name(), err);
            None
        }
    }
}

fn not_configured(provider: Provider) -> Generation {
    Generation::message(format!("{} API key not configured", provider.display_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn groq_router(server: &MockServer) -> ProviderRouter {
        ProviderRouter::new().with_groq(
            GroqClient::new("groq_key")
                .unwrap()
                .with_base_url(&server.base_url()),
        )
    }

    #[test]
    fn selector_without_colon_has_empty_model() {
        assert_eq!(parse_selector("gemini"), ("gemini", ""));
        assert_eq!(parse_selector("groq:gemma2-9b-it"), ("groq", "gemma2-9b-it"));
        assert_eq!(parse_selector("cohere:a:b"), ("cohere", "a:b"));
    }

    #[test]
    fn approx_tokens_counts_words() {
        assert_eq!(approx_tokens("  one two\nthree "), 3);
        assert_eq!(approx_tokens(""), 0);
    }

    #[tokio::test]
    async fn unknown_provider_is_unsupported() {
        let router = ProviderRouter::new();
        let generation = router.generate("foo:bar", "hi", &[], "", &[]).await;

        assert_eq!(generation.content, "Unsupported LLM provider: foo");
        assert_eq!(generation.tokens_used, 0);
    }

    #[tokio::test]
    async fn missing_key_reports_not_configured() {
        let router = ProviderRouter::new();

        for (selector, message) in [
            ("gemini:gemini-2.0-flash", "Gemini API key not configured"),
            ("groq:gemma2-9b-it", "Groq API key not configured"),
            ("cohere", "Cohere API key not configured"),
        ] {
            let generation = router.generate(selector, "hi", &[], "", &[]).await;
            assert_eq!(generation.content, message);
            assert_eq!(generation.tokens_used, 0);
        }
    }

    #[tokio::test]
    async fn provider_failure_becomes_error_message() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(503).body("overloaded");
        });

        let generation = groq_router(&server)
            .generate("groq:gemma2-9b-it", "hi", &[], "", &[])
            .await;

        assert!(generation.content.starts_with("Groq API error: "));
        assert!(generation.content.contains("overloaded"));
        assert_eq!(generation.tokens_used, 0);
    }

    #[tokio::test]
    async fn generate_sends_assembled_prompt() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/chat/completions").is_true(|req| {
                let body = String::from_utf8_lossy(req.body().as_ref());
                body.contains("DOCUMENT CONTEXT:")
                    && body.contains("Document 1: the manual")
                    && body.contains("CONVERSATION CONTEXT:\\nUser: hello")
                    && body.contains("USER QUESTION: what now?")
            });
            then.status(200).json_body(json!({
                "choices": [ { "message": { "content": "Read the manual." } } ],
                "usage": { "total_tokens": 21 }
            }));
        });

        let generation = groq_router(&server)
            .generate(
                "groq:llama-3.1-8b-instant",
                "what now?",
                &[],
                "User: hello",
                &["the manual".to_string()],
            )
            .await;

        assert_eq!(generation.content, "Read the manual.");
        assert_eq!(generation.tokens_used, 21);
        mock.assert_calls(1);
    }

    #[test]
    fn available_llms_lists_configured_providers_only() {
        let router = ProviderRouter::new().with_groq(GroqClient::new("k").unwrap());

        assert!(router.is_configured());
        assert!(!ProviderRouter::new().is_configured());
        assert_eq!(
            router.available_llms(),
            vec![
                "groq:llama-3.1-8b-instant".to_string(),
                "groq:gemma2-9b-it".to_string(),
                "groq:mixtral-8x7b-32768".to_string(),
            ]
        );
    }
}
