use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::{ChatRequest, ProviderKind, ProviderModel};
use crate::core::errors::ApiError;

/// Client for the OpenAI chat-completions wire format. Serves both OpenAI
/// and Groq, which exposes the same API under `/openai/v1`.
#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
    kind: ProviderKind,
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(kind: ProviderKind, base_url: String, api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            kind,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[derive(Deserialize)]
struct OpenAiModelsResponse {
    data: Vec<OpenAiModelInfo>,
}

#[derive(Deserialize)]
struct OpenAiModelInfo {
    id: String,
}

pub(crate) fn build_chat_body(request: &ChatRequest, model_id: &str) -> Value {
    let mut body = json!({
        "model": model_id,
        "messages": request.messages,
        "stream": false,
    });

    if let Some(obj) = body.as_object_mut() {
        if let Some(t) = request.temperature {
            obj.insert("temperature".to_string(), json!(t));
        }
        if let Some(t) = request.max_tokens {
            obj.insert("max_tokens".to_string(), json!(t));
        }
    }
    body
}

pub(crate) fn parse_chat_content(payload: &Value) -> Result<String, ApiError> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ApiError::Upstream("Model response did not contain a message".to_string()))
}

pub(crate) fn parse_embeddings(payload: &Value) -> Vec<Vec<f32>> {
    let Some(data) = payload["data"].as_array() else {
        return Vec::new();
    };

    let mut items: Vec<(u64, Vec<f32>)> = data
        .iter()
        .enumerate()
        .filter_map(|(position, item)| {
            let vals = item["embedding"].as_array()?;
            let index = item["index"].as_u64().unwrap_or(position as u64);
            let vector = vals
                .iter()
                .filter_map(|v| v.as_f64().map(|f| f as f32))
                .collect();
            Some((index, vector))
        })
        .collect();
    items.sort_by_key(|(index, _)| *index);
    items.into_iter().map(|(_, vector)| vector).collect()
}

/// Pulls `error.message` out of an OpenAI-style error body, falling back to the raw text.
pub(crate) fn upstream_error(provider: &str, status: reqwest::StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v["error"]["message"]
                .as_str()
                .or_else(|| v["error"].as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());
    ApiError::Upstream(format!("{} returned {}: {}", provider, status, message))
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        let url = format!("{}/models", self.base_url);
        let res = self.authorized(self.client.get(&url)).send().await;
        match res {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn list_models(&self) -> Result<Vec<ProviderModel>, ApiError> {
        let url = format!("{}/models", self.base_url);
        let res = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(upstream_error(self.name(), status, &text));
        }

        let response: OpenAiModelsResponse = res.json().await.map_err(ApiError::upstream)?;
        Ok(response
            .data
            .into_iter()
            .map(|m| ProviderModel {
                name: m.id.clone(),
                id: m.id,
            })
            .collect())
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = build_chat_body(&request, model_id);

        tracing::debug!(
            "{} chat: model={} messages={}",
            self.name(),
            model_id,
            request.messages.len()
        );

        let res = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(upstream_error(self.name(), status, &text));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;
        parse_chat_content(&payload)
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = json!({
            "model": model_id,
            "input": inputs,
        });

        let res = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(upstream_error(self.name(), status, &text));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;
        let embeddings = parse_embeddings(&payload);
        if embeddings.len() != inputs.len() {
            return Err(ApiError::Upstream(format!(
                "{} returned {} embeddings for {} inputs",
                self.name(),
                embeddings.len(),
                inputs.len()
            )));
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ChatMessage;

    #[test]
    fn chat_body_only_carries_set_options() {
        let request = ChatRequest::new(vec![ChatMessage::user("Hello")]).with_max_tokens(Some(150));
        let body = build_chat_body(&request, "gpt-4o");

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["max_tokens"], 150);
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn chat_content_is_read_from_first_choice() {
        let payload = json!({"choices": [{"message": {"role": "assistant", "content": "Hi there"}}]});
        assert_eq!(parse_chat_content(&payload).unwrap(), "Hi there");

        let err = parse_chat_content(&json!({"choices": []})).unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
    }

    #[test]
    fn embeddings_follow_index_order() {
        let payload = json!({"data": [
            {"index": 1, "embedding": [0.0, 1.0]},
            {"index": 0, "embedding": [1.0, 0.0]}
        ]});
        let vectors = parse_embeddings(&payload);
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn upstream_error_prefers_structured_message() {
        let err = upstream_error(
            "groq",
            reqwest::StatusCode::UNAUTHORIZED,
            r#"{"error": {"message": "Invalid API Key"}}"#,
        );
        assert_eq!(
            err.to_string(),
            "upstream error: groq returned 401 Unauthorized: Invalid API Key"
        );
    }
}
