pub mod huggingface;
pub mod ollama;
pub mod openai_compat;
pub mod provider;
pub mod service;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use provider::LlmProvider;
pub use service::{ChatModel, Embedder, LlmService};
pub use types::{ChatMessage, ChatRequest, ModelChoice, ProviderKind};
