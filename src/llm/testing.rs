use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::provider::LlmProvider;
use super::types::{ChatRequest, ProviderModel};
use crate::core::errors::ApiError;

/// In-process provider for unit tests: answers from a script and embeds
/// text as a 26-dimension letter histogram.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ChatRequest>>,
    embed_calls: Mutex<usize>,
    fail_with: Option<String>,
}

impl ScriptedProvider {
    pub fn new<S: Into<String>>(replies: Vec<S>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
            embed_calls: Mutex::new(0),
            fail_with: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        let mut provider = Self::new(Vec::<String>::new());
        provider.fail_with = Some(message.to_string());
        provider
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn embed_calls(&self) -> usize {
        *self.embed_calls.lock().unwrap()
    }
}

pub fn letter_histogram(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; 26];
    for c in text.to_lowercase().chars() {
        if c.is_ascii_lowercase() {
            vector[(c as u8 - b'a') as usize] += 1.0;
        }
    }
    vector
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        Ok(true)
    }

    async fn list_models(&self) -> Result<Vec<ProviderModel>, ApiError> {
        Ok(vec![ProviderModel {
            id: "scripted-model".to_string(),
            name: "scripted-model".to_string(),
        }])
    }

    async fn chat(&self, request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
        self.requests.lock().unwrap().push(request);
        if let Some(message) = &self.fail_with {
            return Err(ApiError::Upstream(message.clone()));
        }
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "ok".to_string()))
    }

    async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        *self.embed_calls.lock().unwrap() += 1;
        Ok(inputs.iter().map(|text| letter_histogram(text)).collect())
    }
}
