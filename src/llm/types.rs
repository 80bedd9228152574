use std::fmt;

use serde::{Deserialize, Serialize};

/// Backends the playground can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Groq,
    Ollama,
    HuggingFace,
}

impl ProviderKind {
    pub const CHAT_PROVIDERS: [ProviderKind; 3] =
        [ProviderKind::OpenAi, ProviderKind::Groq, ProviderKind::Ollama];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Groq => "groq",
            ProviderKind::Ollama => "ollama",
            ProviderKind::HuggingFace => "huggingface",
        }
    }

    /// Hosted backends refuse to run without a key; Ollama is local.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }

    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Groq => Some("GROQ_API_KEY"),
            ProviderKind::HuggingFace => Some("HUGGINGFACE_TOKEN"),
            ProviderKind::Ollama => None,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Groq => "https://api.groq.com/openai/v1",
            ProviderKind::Ollama => "http://localhost:11434",
            ProviderKind::HuggingFace => "https://api-inference.huggingface.co",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o",
            ProviderKind::Groq => "llama-3.1-8b-instant",
            ProviderKind::Ollama => "gemma:2b",
            ProviderKind::HuggingFace => "sentence-transformers/all-MiniLM-L6-v2",
        }
    }

    pub fn default_models(&self) -> Vec<String> {
        let models: &[&str] = match self {
            ProviderKind::OpenAi => &["gpt-4o", "gpt-4-turbo", "gpt-4"],
            ProviderKind::Groq => &["llama-3.1-8b-instant", "gemma2-9b-it", "llama3-8b-8192"],
            ProviderKind::Ollama => &["gemma:2b", "mistral"],
            ProviderKind::HuggingFace => &["sentence-transformers/all-MiniLM-L6-v2"],
        };
        models.iter().map(|m| m.to_string()).collect()
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderModel {
    pub id: String,
    pub name: String,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature.or(self.temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens.or(self.max_tokens);
        self
    }
}

/// Per-request model selection coming from the UI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelChoice {
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_ollama_runs_without_a_key() {
        assert!(!ProviderKind::Ollama.requires_api_key());
        assert!(ProviderKind::OpenAi.requires_api_key());
        assert_eq!(ProviderKind::Groq.api_key_env(), Some("GROQ_API_KEY"));
    }

    #[test]
    fn request_overrides_only_replace_when_present() {
        let request = ChatRequest::new(vec![ChatMessage::user("hi")])
            .with_temperature(Some(0.2))
            .with_temperature(None)
            .with_max_tokens(Some(50));

        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(50));
    }

    #[test]
    fn provider_kind_serializes_lowercase() {
        let value = serde_json::to_value(ProviderKind::HuggingFace).unwrap();
        assert_eq!(value, "huggingface");
        let parsed: ProviderKind = serde_json::from_value(serde_json::json!("openai")).unwrap();
        assert_eq!(parsed, ProviderKind::OpenAi);
    }
}
