//! Process settings for the chatbot
//!
//! Loads settings from config.yml; API keys may also come from the
//! environment (or a `.env` file), which takes precedence.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Default constants (fallback if config.yml not found)
pub const DEFAULT_MAX_MESSAGES: usize = 10;
pub const DEFAULT_CONTEXT_MESSAGES: usize = 5;
pub const DEFAULT_TOP_K: usize = 3;
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;
pub const DEFAULT_LLM: &str = "gemini:gemini-2.0-flash";

pub const GEMINI_MODELS: &[&str] = &[
    "gemini-2.0-flash",
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
    "gemini-1.5-flash",
];
pub const GROQ_MODELS: &[&str] = &["llama-3.1-8b-instant", "gemma2-9b-it", "mixtral-8x7b-32768"];
pub const COHERE_MODELS: &[&str] = &[
    "command-a-03-2025",
    "command-r-plus-08-2024",
    "command-a-vision-07-2025",
];
pub const RAG_VARIANTS: &[&str] = &["basic", "knowledge_graph", "hybrid"];

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    api_keys: Option<ApiKeysConfig>,
    models: Option<ModelsConfig>,
    memory: Option<MemoryConfig>,
    retrieval: Option<RetrievalConfig>,
    documents: Option<DocumentsConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiKeysConfig {
    gemini: Option<String>,
    groq: Option<String>,
    cohere: Option<String>,
    serper: Option<String>,
    huggingface: Option<String>,
    openai: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelsConfig {
    gemini: Option<Vec<String>>,
    groq: Option<Vec<String>>,
    cohere: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct MemoryConfig {
    max_messages: Option<usize>,
    context_messages: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RetrievalConfig {
    top_k: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct DocumentsConfig {
    max_file_size: Option<usize>,
}

/// Main settings struct
#[derive(Debug, Clone)]
pub struct Settings {
    pub gemini_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub cohere_api_key: Option<String>,
    pub serper_api_key: Option<String>,
    pub huggingface_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub gemini_models: Vec<String>,
    pub groq_models: Vec<String>,
    pub cohere_models: Vec<String>,
    pub max_messages: usize,
    pub context_messages: usize,
    pub retrieval_top_k: usize,
    pub max_file_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    /// Load settings from config.yml or use defaults
    /// Environment variables take precedence over config.yml values
    pub fn new() -> Self {
        Self::load_from_file("config.yml")
            .or_else(|_| Self::load_from_file("../config.yml"))
            .unwrap_or_else(|_| Self::defaults())
    }

    /// Resolve a value: prefer env var if config value looks like ${VAR}
    fn resolve_env_string(value: Option<String>, env_key: &str) -> Option<String> {
        if let Some(ref v) = value {
            if v.starts_with("${") && v.ends_with('}') {
                let var_name = &v[2..v.len() - 1];
                if let Ok(env_val) = std::env::var(var_name) {
                    return non_empty(env_val);
                }
            }
        }
        if let Ok(env_val) = std::env::var(env_key) {
            if let Some(found) = non_empty(env_val) {
                return Some(found);
            }
        }
        value
            .filter(|v| !(v.starts_with("${") && v.ends_with('}')))
            .and_then(non_empty)
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load settings from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigError(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let yaml: YamlConfig = serde_yaml::from_str(&content)?;
        Ok(Self::from_yaml(yaml))
    }

    /// Settings with no config file; keys still come from the environment.
    pub fn defaults() -> Self {
        Self::load_dotenv();
        Self::from_yaml(YamlConfig::default())
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        let keys = yaml.api_keys.unwrap_or_default();
        let models = yaml.models.unwrap_or_default();
        let memory = yaml.memory.unwrap_or_default();
        let retrieval = yaml.retrieval.unwrap_or_default();
        let documents = yaml.documents.unwrap_or_default();

        Self {
            gemini_api_key: Self::resolve_env_string(keys.gemini, "GEMINI_API_KEY"),
            groq_api_key: Self::resolve_env_string(keys.groq, "GROQ_API_KEY"),
            cohere_api_key: Self::resolve_env_string(keys.cohere, "COHERE_API_KEY"),
            serper_api_key: Self::resolve_env_string(keys.serper, "SERPER_API_KEY"),
            huggingface_api_key: Self::resolve_env_string(keys.huggingface, "HF_API_KEY"),
            openai_api_key: Self::resolve_env_string(keys.openai, "OPENAI_API_KEY"),
            gemini_models: models.gemini.unwrap_or_else(|| to_owned(GEMINI_MODELS)),
            groq_models: models.groq.unwrap_or_else(|| to_owned(GROQ_MODELS)),
            cohere_models: models.cohere.unwrap_or_else(|| to_owned(COHERE_MODELS)),
            max_messages: memory
                .max_messages
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_MESSAGES),
            context_messages: memory.context_messages.unwrap_or(DEFAULT_CONTEXT_MESSAGES),
            retrieval_top_k: retrieval
                .top_k
                .filter(|k| *k > 0)
                .unwrap_or(DEFAULT_TOP_K),
            max_file_size: documents.max_file_size.unwrap_or(MAX_FILE_SIZE),
        }
    }

    /// `provider:model` pairs for every provider with a configured key.
    pub fn available_llms(&self) -> Vec<String> {
        let mut all = Vec::new();
        let groups = [
            ("gemini", &self.gemini_api_key, &self.gemini_models),
            ("groq", &self.groq_api_key, &self.groq_models),
            ("cohere", &self.cohere_api_key, &self.cohere_models),
        ];
        for (provider, key, models) in groups {
            if key.is_some() {
                all.extend(models.iter().map(|m| format!("{}:{}", provider, m)));
            }
        }
        all
    }

    /// First available model, or the built-in default.
    pub fn default_llm(&self) -> String {
        self.available_llms()
            .into_iter()
            .next()
            .unwrap_or_else(|| DEFAULT_LLM.to_string())
    }

    pub fn rag_variants(&self) -> Vec<String> {
        to_owned(RAG_VARIANTS)
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn to_owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{LazyLock, Mutex};

    static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    const KEY_VARS: &[&str] = &[
        "GEMINI_API_KEY",
        "GROQ_API_KEY",
        "COHERE_API_KEY",
        "SERPER_API_KEY",
        "HF_API_KEY",
        "OPENAI_API_KEY",
        "CUSTOM_GROQ_KEY",
    ];

    struct EnvGuard {
        key: String,
        original: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let original = std::env::var(key).ok();
            std::env::set_var(key, value);
            Self {
                key: key.to_string(),
                original,
            }
        }

        fn unset(key: &str) -> Self {
            let original = std::env::var(key).ok();
            std::env::remove_var(key);
            Self {
                key: key.to_string(),
                original,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.original {
                Some(value) => std::env::set_var(&self.key, value),
                None => std::env::remove_var(&self.key),
            }
        }
    }

    fn clear_keys() -> Vec<EnvGuard> {
        KEY_VARS.iter().map(|k| EnvGuard::unset(k)).collect()
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn test_from_empty_yaml_uses_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guards = clear_keys();

        let settings = Settings::from_yaml(YamlConfig::default());

        assert_eq!(settings.max_messages, DEFAULT_MAX_MESSAGES);
        assert_eq!(settings.context_messages, DEFAULT_CONTEXT_MESSAGES);
        assert_eq!(settings.retrieval_top_k, DEFAULT_TOP_K);
        assert_eq!(settings.max_file_size, MAX_FILE_SIZE);
        assert_eq!(settings.gemini_models.len(), GEMINI_MODELS.len());
        assert!(settings.available_llms().is_empty());
        assert_eq!(settings.default_llm(), DEFAULT_LLM);
    }

    #[test]
    fn test_env_key_enables_provider_models() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guards = clear_keys();
        let _groq = EnvGuard::set("GROQ_API_KEY", "gsk_test");

        let settings = Settings::from_yaml(YamlConfig::default());
        let llms = settings.available_llms();

        assert_eq!(llms.len(), GROQ_MODELS.len());
        assert!(llms.iter().all(|m| m.starts_with("groq:")));
        assert_eq!(settings.default_llm(), "groq:llama-3.1-8b-instant");
    }

    #[test]
    fn test_load_from_file_with_placeholders_and_limits() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guards = clear_keys();
        let _custom = EnvGuard::set("CUSTOM_GROQ_KEY", "from_placeholder");

        let file = write_config(
            r#"
api_keys:
  groq: ${CUSTOM_GROQ_KEY}
  cohere: literal_cohere_key
  gemini: ${MISSING_VAR_FOR_TEST}
models:
  cohere: [command-r-plus]
memory:
  max_messages: 4
  context_messages: 2
retrieval:
  top_k: 7
"#,
        );

        let settings = Settings::load_from_file(file.path()).unwrap();

        assert_eq!(settings.groq_api_key.as_deref(), Some("from_placeholder"));
        assert_eq!(settings.cohere_api_key.as_deref(), Some("literal_cohere_key"));
        assert!(settings.gemini_api_key.is_none());
        assert_eq!(settings.cohere_models, vec!["command-r-plus".to_string()]);
        assert_eq!(settings.max_messages, 4);
        assert_eq!(settings.context_messages, 2);
        assert_eq!(settings.retrieval_top_k, 7);
        assert!(settings
            .available_llms()
            .contains(&"cohere:command-r-plus".to_string()));
    }

    #[test]
    fn test_env_var_overrides_literal_value() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guards = clear_keys();
        let _serper = EnvGuard::set("SERPER_API_KEY", "env_serper");

        let file = write_config("api_keys:\n  serper: yaml_serper\n");
        let settings = Settings::load_from_file(file.path()).unwrap();

        assert_eq!(settings.serper_api_key.as_deref(), Some("env_serper"));
    }

    #[test]
    fn test_blank_env_value_is_treated_as_missing() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guards = clear_keys();
        let _blank = EnvGuard::set("GEMINI_API_KEY", "   ");

        let settings = Settings::from_yaml(YamlConfig::default());
        assert!(settings.gemini_api_key.is_none());
    }

    #[test]
    fn test_zero_capacity_falls_back_to_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guards = clear_keys();

        let file = write_config("memory:\n  max_messages: 0\nretrieval:\n  top_k: 0\n");
        let settings = Settings::load_from_file(file.path()).unwrap();

        assert_eq!(settings.max_messages, DEFAULT_MAX_MESSAGES);
        assert_eq!(settings.retrieval_top_k, DEFAULT_TOP_K);
    }

    #[test]
    fn test_load_from_missing_file_errors() {
        let err = Settings::load_from_file("/definitely/not/here/config.yml").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_load_from_invalid_yaml_errors() {
        let file = write_config("api_keys: [unclosed");
        let err = Settings::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_rag_variants_listed() {
        let settings = Settings::from_yaml(YamlConfig::default());
        assert_eq!(
            settings.rag_variants(),
            vec!["basic", "knowledge_graph", "hybrid"]
        );
    }
}
