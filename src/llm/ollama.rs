use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::openai_compat::upstream_error;
use super::provider::LlmProvider;
use super::types::{ChatRequest, ProviderModel};
use crate::core::errors::ApiError;

/// Local Ollama server speaking its native `/api/*` endpoints.
#[derive(Clone)]
pub struct OllamaProvider {
    base_url: String,
    client: Client,
}

impl OllamaProvider {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[derive(Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModelInfo>,
}

#[derive(Deserialize)]
struct OllamaModelInfo {
    name: String,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

pub(crate) fn build_chat_body(request: &ChatRequest, model_id: &str) -> Value {
    let mut options = Map::new();
    if let Some(t) = request.temperature {
        options.insert("temperature".to_string(), json!(t));
    }
    if let Some(n) = request.max_tokens {
        options.insert("num_predict".to_string(), json!(n));
    }

    let mut body = json!({
        "model": model_id,
        "messages": request.messages,
        "stream": false,
    });
    if !options.is_empty() {
        body["options"] = Value::Object(options);
    }
    body
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn list_models(&self) -> Result<Vec<ProviderModel>, ApiError> {
        let url = format!("{}/api/tags", self.base_url);
        let res = self.client.get(&url).send().await.map_err(|e| {
            ApiError::ServiceUnavailable(format!("Ollama is not reachable at {}: {}", self.base_url, e))
        })?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(upstream_error(self.name(), status, &text));
        }

        let tags: OllamaTagsResponse = res.json().await.map_err(ApiError::upstream)?;
        Ok(tags
            .models
            .into_iter()
            .map(|m| ProviderModel {
                id: m.name.clone(),
                name: m.name,
            })
            .collect())
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = build_chat_body(&request, model_id);

        tracing::debug!("ollama chat: model={} messages={}", model_id, request.messages.len());

        let res = self.client.post(&url).json(&body).send().await.map_err(|e| {
            ApiError::ServiceUnavailable(format!("Ollama is not reachable at {}: {}", self.base_url, e))
        })?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(upstream_error(self.name(), status, &text));
        }

        let payload: OllamaChatResponse = res.json().await.map_err(ApiError::upstream)?;
        if let Some(error) = payload.error {
            return Err(ApiError::Upstream(format!("ollama: {}", error)));
        }
        payload
            .message
            .map(|m| m.content)
            .ok_or_else(|| ApiError::Upstream("ollama response did not contain a message".to_string()))
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        let url = format!("{}/api/embed", self.base_url);
        let body = json!({
            "model": model_id,
            "input": inputs,
        });

        let res = self.client.post(&url).json(&body).send().await.map_err(|e| {
            ApiError::ServiceUnavailable(format!("Ollama is not reachable at {}: {}", self.base_url, e))
        })?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(upstream_error(self.name(), status, &text));
        }

        let payload: OllamaEmbedResponse = res.json().await.map_err(ApiError::upstream)?;
        if payload.embeddings.len() != inputs.len() {
            return Err(ApiError::Upstream(format!(
                "ollama returned {} embeddings for {} inputs",
                payload.embeddings.len(),
                inputs.len()
            )));
        }
        Ok(payload.embeddings)
    }
}
