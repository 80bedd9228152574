use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::openai_compat::upstream_error;
use super::provider::LlmProvider;
use super::types::{ChatRequest, ProviderModel};
use crate::core::errors::ApiError;

/// HuggingFace Inference API, used for sentence-transformer embeddings only.
#[derive(Clone)]
pub struct HuggingFaceProvider {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl HuggingFaceProvider {
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }
}

/// Accepts either one pooled vector per input or token-level vectors,
/// which are mean-pooled.
pub(crate) fn parse_feature_extraction(payload: &Value) -> Result<Vec<Vec<f32>>, ApiError> {
    let rows = payload
        .as_array()
        .ok_or_else(|| ApiError::Upstream("huggingface returned a non-array payload".to_string()))?;

    rows.iter()
        .map(|row| {
            let items = row.as_array().ok_or_else(|| {
                ApiError::Upstream("huggingface returned a malformed embedding".to_string())
            })?;
            if items.first().map(Value::is_array).unwrap_or(false) {
                Ok(mean_pool(items))
            } else {
                Ok(items
                    .iter()
                    .filter_map(|v| v.as_f64().map(|f| f as f32))
                    .collect())
            }
        })
        .collect()
}

fn mean_pool(tokens: &[Value]) -> Vec<f32> {
    let vectors: Vec<Vec<f32>> = tokens
        .iter()
        .filter_map(Value::as_array)
        .map(|t| t.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect())
        .collect();
    let Some(dim) = vectors.first().map(Vec::len) else {
        return Vec::new();
    };

    let mut pooled = vec![0.0f32; dim];
    for vector in vectors.iter().filter(|v| v.len() == dim) {
        for (acc, value) in pooled.iter_mut().zip(vector) {
            *acc += value;
        }
    }
    let count = vectors.iter().filter(|v| v.len() == dim).count().max(1) as f32;
    pooled.iter_mut().for_each(|v| *v /= count);
    pooled
}

#[async_trait]
impl LlmProvider for HuggingFaceProvider {
    fn name(&self) -> &str {
        "huggingface"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        Ok(self.api_key.is_some())
    }

    async fn list_models(&self) -> Result<Vec<ProviderModel>, ApiError> {
        Ok(Vec::new())
    }

    async fn chat(&self, _request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
        Err(ApiError::NotImplemented(
            "HuggingFace is only wired up for embeddings".to_string(),
        ))
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        let url = format!("{}/pipeline/feature-extraction/{}", self.base_url, model_id);
        let body = json!({
            "inputs": inputs,
            "options": { "wait_for_model": true },
        });

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let res = builder.send().await.map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(upstream_error(self.name(), status, &text));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;
        let embeddings = parse_feature_extraction(&payload)?;
        if embeddings.len() != inputs.len() {
            return Err(ApiError::Upstream(format!(
                "huggingface returned {} embeddings for {} inputs",
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

    #[test]
    fn pooled_vectors_pass_through() {
        let payload = json!([[0.1, 0.2], [0.3, 0.4]]);
        let vectors = parse_feature_extraction(&payload).unwrap();
        assert_eq!(vectors.len(), 2);
        assert!((vectors[1][0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn token_vectors_are_mean_pooled() {
        let payload = json!([[[1.0, 0.0], [3.0, 2.0]]]);
        let vectors = parse_feature_extraction(&payload).unwrap();
        assert_eq!(vectors, vec![vec![2.0, 1.0]]);
    }

    #[test]
    fn error_objects_are_rejected() {
        let err = parse_feature_extraction(&json!({"error": "Model is loading"})).unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
    }
}
