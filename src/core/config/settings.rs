//! Typed view over the merged YAML configuration.
//!
//! Every field has a default so an empty `config.yml` yields a working
//! setup: Groq for chat, HuggingFace sentence-transformers for embeddings,
//! and PDFs under `research_papers/`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::core::errors::ApiError;
use crate::llm::types::ProviderKind;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub embeddings: EmbeddingSettings,
    pub rag: RagSettings,
    pub summarize: SummarizeSettings,
    pub langsmith: LangsmithSettings,
}

impl Settings {
    pub fn from_value(config: &Value) -> Result<Self, ApiError> {
        serde_json::from_value(config.clone())
            .map_err(|e| ApiError::BadRequest(format!("Invalid config: {}", e)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub default_provider: ProviderKind,
    pub temperature: f64,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub openai: ProviderSettings,
    pub groq: ProviderSettings,
    pub ollama: ProviderSettings,
    pub huggingface: ProviderSettings,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            default_provider: ProviderKind::Groq,
            temperature: 0.7,
            max_tokens: 150,
            request_timeout_secs: 120,
            openai: ProviderSettings::default(),
            groq: ProviderSettings::default(),
            ollama: ProviderSettings::default(),
            huggingface: ProviderSettings::default(),
        }
    }
}

impl LlmSettings {
    pub fn provider(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Groq => &self.groq,
            ProviderKind::Ollama => &self.ollama,
            ProviderKind::HuggingFace => &self.huggingface,
        }
    }

    pub fn base_url(&self, kind: ProviderKind) -> String {
        self.provider(kind)
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(kind.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn default_model(&self, kind: ProviderKind) -> String {
        self.provider(kind)
            .model
            .clone()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| kind.default_model().to_string())
    }

    pub fn models(&self, kind: ProviderKind) -> Vec<String> {
        let configured = &self.provider(kind).models;
        if configured.is_empty() {
            kind.default_models()
        } else {
            configured.clone()
        }
    }

    pub fn api_key(&self, kind: ProviderKind) -> Option<String> {
        self.provider(kind)
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: ProviderKind,
    pub model: Option<String>,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::HuggingFace,
            model: None,
            batch_size: 32,
        }
    }
}

impl EmbeddingSettings {
    pub fn model(&self) -> String {
        if let Some(model) = self.model.as_deref().filter(|m| !m.trim().is_empty()) {
            return model.to_string();
        }
        match self.provider {
            ProviderKind::OpenAi => "text-embedding-3-small".to_string(),
            ProviderKind::Ollama => "nomic-embed-text".to_string(),
            other => other.default_model().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

const RESEARCH_CHUNKING: ChunkSettings = ChunkSettings {
    chunk_size: 1000,
    chunk_overlap: 200,
};
const SESSION_CHUNKING: ChunkSettings = ChunkSettings {
    chunk_size: 5000,
    chunk_overlap: 500,
};
const SUMMARY_CHUNKING: ChunkSettings = ChunkSettings {
    chunk_size: 4000,
    chunk_overlap: 200,
};

/// A chunking section as written; missing fields fall back to the section's own defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartialChunkSettings {
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
}

impl PartialChunkSettings {
    fn over(self, base: ChunkSettings) -> ChunkSettings {
        ChunkSettings {
            chunk_size: self.chunk_size.unwrap_or(base.chunk_size),
            chunk_overlap: self.chunk_overlap.unwrap_or(base.chunk_overlap),
        }
    }
}

fn chunking_over<'de, D>(deserializer: D, base: ChunkSettings) -> Result<ChunkSettings, D::Error>
where
    D: Deserializer<'de>,
{
    let partial = Option::<PartialChunkSettings>::deserialize(deserializer)?;
    Ok(partial.unwrap_or_default().over(base))
}

fn research_chunking<'de, D: Deserializer<'de>>(d: D) -> Result<ChunkSettings, D::Error> {
    chunking_over(d, RESEARCH_CHUNKING)
}

fn session_chunking<'de, D: Deserializer<'de>>(d: D) -> Result<ChunkSettings, D::Error> {
    chunking_over(d, SESSION_CHUNKING)
}

fn summary_chunking<'de, D: Deserializer<'de>>(d: D) -> Result<ChunkSettings, D::Error> {
    chunking_over(d, SUMMARY_CHUNKING)
}

/// Which model a chain uses when the request does not say.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainModel {
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub documents_dir: String,
    pub max_documents: usize,
    pub top_k: usize,
    #[serde(deserialize_with = "research_chunking")]
    pub research_chunking: ChunkSettings,
    #[serde(deserialize_with = "session_chunking")]
    pub session_chunking: ChunkSettings,
    pub research_model: ChainModel,
    pub session_model: ChainModel,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            documents_dir: "research_papers".to_string(),
            max_documents: 50,
            top_k: 4,
            research_chunking: RESEARCH_CHUNKING,
            session_chunking: SESSION_CHUNKING,
            research_model: ChainModel {
                provider: Some(ProviderKind::Groq),
                model: Some("llama-3.1-8b-instant".to_string()),
                temperature: None,
            },
            session_model: ChainModel {
                provider: Some(ProviderKind::Groq),
                model: Some("gemma2-9b-it".to_string()),
                temperature: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizeSettings {
    #[serde(deserialize_with = "summary_chunking")]
    pub chunking: ChunkSettings,
    pub collapse_max_chars: usize,
    pub map_concurrency: usize,
    pub summary_words: usize,
    pub subtitle_lang: String,
    pub ytdlp_binary: String,
    pub fetch_timeout_secs: u64,
    pub max_fetch_chars: usize,
    pub model: ChainModel,
}

impl Default for SummarizeSettings {
    fn default() -> Self {
        Self {
            chunking: SUMMARY_CHUNKING,
            collapse_max_chars: 12_000,
            map_concurrency: 4,
            summary_words: 300,
            subtitle_lang: "en".to_string(),
            ytdlp_binary: "yt-dlp".to_string(),
            fetch_timeout_secs: 30,
            max_fetch_chars: 200_000,
            model: ChainModel {
                provider: Some(ProviderKind::Groq),
                model: Some("llama-3.1-8b-instant".to_string()),
                temperature: None,
            },
        }
    }
}

/// LangSmith tracing credentials. Only reported in `/api/status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LangsmithSettings {
    pub api_key: Option<String>,
    pub project: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_config_yields_defaults() {
        let settings = Settings::from_value(&json!({})).unwrap();

        assert_eq!(settings.server.port, 8501);
        assert_eq!(settings.llm.default_provider, ProviderKind::Groq);
        assert_eq!(settings.rag.research_chunking.chunk_size, 1000);
        assert_eq!(settings.rag.session_chunking.chunk_overlap, 500);
        assert_eq!(settings.summarize.summary_words, 300);
        assert_eq!(
            settings.embeddings.model(),
            "sentence-transformers/all-MiniLM-L6-v2"
        );
    }

    #[test]
    fn partial_chunking_section_keeps_its_own_defaults() {
        let settings = Settings::from_value(&json!({
            "rag": {
                "research_chunking": {"chunk_size": 2000},
                "session_chunking": {"chunk_overlap": 100}
            },
            "summarize": {"chunking": null}
        }))
        .unwrap();

        assert_eq!(settings.rag.research_chunking.chunk_size, 2000);
        assert_eq!(settings.rag.research_chunking.chunk_overlap, 200);
        assert_eq!(settings.rag.session_chunking.chunk_size, 5000);
        assert_eq!(settings.rag.session_chunking.chunk_overlap, 100);
        assert_eq!(settings.summarize.chunking, SUMMARY_CHUNKING);
        assert_eq!(settings.rag.top_k, 4);
    }

    #[test]
    fn partial_provider_section_keeps_builtin_defaults() {
        let settings = Settings::from_value(&json!({
            "llm": {"openai": {"api_key": " sk-1 "}}
        }))
        .unwrap();

        assert_eq!(settings.llm.api_key(ProviderKind::OpenAi).as_deref(), Some("sk-1"));
        assert_eq!(settings.llm.base_url(ProviderKind::OpenAi), "https://api.openai.com/v1");
        assert_eq!(settings.llm.default_model(ProviderKind::OpenAi), "gpt-4o");
        assert_eq!(settings.llm.models(ProviderKind::OpenAi).len(), 3);
        assert_eq!(settings.llm.temperature, 0.7);
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let settings = Settings::from_value(&json!({
            "llm": {"groq": {"api_key": "   "}}
        }))
        .unwrap();
        assert!(settings.llm.api_key(ProviderKind::Groq).is_none());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let settings = Settings::from_value(&json!({
            "llm": {"ollama": {"base_url": "http://gpu-box:11434/"}}
        }))
        .unwrap();
        assert_eq!(settings.llm.base_url(ProviderKind::Ollama), "http://gpu-box:11434");
    }

    #[test]
    fn wrong_types_are_rejected() {
        let err = Settings::from_value(&json!({"llm": {"default_provider": "nope"}})).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
