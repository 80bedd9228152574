use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::core::config::settings::{ChainModel, EmbeddingSettings, LlmSettings};
use crate::core::errors::ApiError;
use crate::llm::huggingface::HuggingFaceProvider;
use crate::llm::ollama::OllamaProvider;
use crate::llm::openai_compat::OpenAiCompatibleProvider;
use crate::llm::provider::LlmProvider;
use crate::llm::types::{ChatMessage, ChatRequest, ModelChoice, ProviderKind};

/// Builds provider clients from settings and request overrides.
///
/// Key checks happen here, before any client exists, so a request without
/// a usable API key never reaches the network.
#[derive(Clone, Default)]
pub struct LlmService {
    registered: Arc<RwLock<HashMap<ProviderKind, Arc<dyn LlmProvider>>>>,
}

/// A provider bound to one model and its sampling options.
#[derive(Clone)]
pub struct ChatModel {
    pub kind: ProviderKind,
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    provider: Arc<dyn LlmProvider>,
}

impl std::fmt::Debug for ChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatModel")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ChatModel {
    pub async fn invoke(&self, messages: Vec<ChatMessage>) -> Result<String, ApiError> {
        let request = ChatRequest::new(messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        self.provider.chat(request, &self.model).await
    }
}

/// A provider bound to one embedding model.
#[derive(Clone)]
pub struct Embedder {
    pub kind: ProviderKind,
    pub model: String,
    batch_size: usize,
    provider: Arc<dyn LlmProvider>,
}

impl Embedder {
    pub async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size.max(1)) {
            let embedded = self.provider.embed(batch, &self.model).await?;
            if embedded.len() != batch.len() {
                return Err(ApiError::Upstream(format!(
                    "{} returned {} embeddings for {} inputs",
                    self.kind,
                    embedded.len(),
                    batch.len()
                )));
            }
            vectors.extend(embedded);
        }
        Ok(vectors)
    }

    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ApiError::Upstream(format!("{} returned no embedding", self.kind)))
    }
}

impl LlmService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the built-in client for a provider. Key checks still apply.
    pub fn register(&self, kind: ProviderKind, provider: Arc<dyn LlmProvider>) {
        if let Ok(mut map) = self.registered.write() {
            map.insert(kind, provider);
        }
    }

    pub fn chat_model(
        &self,
        settings: &LlmSettings,
        chain: &ChainModel,
        choice: &ModelChoice,
    ) -> Result<ChatModel, ApiError> {
        let kind = choice
            .provider
            .or(chain.provider)
            .unwrap_or(settings.default_provider);
        if kind == ProviderKind::HuggingFace {
            return Err(ApiError::BadRequest(
                "HuggingFace can only be used for embeddings".to_string(),
            ));
        }

        // A chain's model only applies to the chain's own provider.
        let chain_model = chain
            .model
            .clone()
            .filter(|_| chain.provider.map(|p| p == kind).unwrap_or(true));
        let model = choice
            .model
            .clone()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .or(chain_model)
            .unwrap_or_else(|| settings.default_model(kind));

        let temperature = choice
            .temperature
            .or(chain.temperature)
            .unwrap_or(settings.temperature);
        if !(0.0..=1.0).contains(&temperature) {
            return Err(ApiError::BadRequest(
                "Temperature must be between 0.0 and 1.0".to_string(),
            ));
        }
        let max_tokens = choice.max_tokens.unwrap_or(settings.max_tokens);
        if max_tokens == 0 {
            return Err(ApiError::BadRequest("Max tokens must be positive".to_string()));
        }

        let api_key = resolve_api_key(settings, kind, choice.api_key.as_deref())?;
        let provider = self.provider(settings, kind, api_key);

        Ok(ChatModel {
            kind,
            model,
            temperature: Some(temperature),
            max_tokens: Some(max_tokens),
            provider,
        })
    }

    pub fn embedder(
        &self,
        settings: &LlmSettings,
        embeddings: &EmbeddingSettings,
    ) -> Result<Embedder, ApiError> {
        let kind = embeddings.provider;
        let api_key = resolve_api_key(settings, kind, None)?;
        let provider = self.provider(settings, kind, api_key);

        Ok(Embedder {
            kind,
            model: embeddings.model(),
            batch_size: embeddings.batch_size,
            provider,
        })
    }

    /// Client for listing models or health checks; skips the key requirement.
    pub fn raw_provider(&self, settings: &LlmSettings, kind: ProviderKind) -> Arc<dyn LlmProvider> {
        self.provider(settings, kind, settings.api_key(kind))
    }

    fn provider(
        &self,
        settings: &LlmSettings,
        kind: ProviderKind,
        api_key: Option<String>,
    ) -> Arc<dyn LlmProvider> {
        if let Some(registered) = self
            .registered
            .read()
            .ok()
            .and_then(|map| map.get(&kind).cloned())
        {
            return registered;
        }

        let timeout = Duration::from_secs(settings.request_timeout_secs.max(1));
        let base_url = settings.base_url(kind);
        match kind {
            ProviderKind::OpenAi | ProviderKind::Groq => Arc::new(OpenAiCompatibleProvider::new(
                kind, base_url, api_key, timeout,
            )),
            ProviderKind::Ollama => Arc::new(OllamaProvider::new(base_url, timeout)),
            ProviderKind::HuggingFace => {
                Arc::new(HuggingFaceProvider::new(base_url, api_key, timeout))
            }
        }
    }
}

fn resolve_api_key(
    settings: &LlmSettings,
    kind: ProviderKind,
    request_key: Option<&str>,
) -> Result<Option<String>, ApiError> {
    let key = request_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .or_else(|| settings.api_key(kind));

    if key.is_none() && kind.requires_api_key() {
        let env_hint = kind.api_key_env().unwrap_or("API key");
        return Err(ApiError::BadRequest(format!(
            "Please provide the {} API key ({}) to get started",
            kind, env_hint
        )));
    }
    Ok(key)
}
