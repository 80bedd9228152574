use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::llm::ProviderKind;
use crate::rag::RESEARCH_SCOPE;
use crate::state::AppState;

pub async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let settings = state.config.settings()?;

    let keys = json!({
        "openai": settings.llm.api_key(ProviderKind::OpenAi).is_some(),
        "groq": settings.llm.api_key(ProviderKind::Groq).is_some(),
        "huggingface": settings.llm.api_key(ProviderKind::HuggingFace).is_some(),
        "langsmith": settings.langsmith.api_key.as_deref().map(|k| !k.trim().is_empty()).unwrap_or(false),
    });

    let research_chunks = state.rag_store.count(RESEARCH_SCOPE).await;
    let session_indexes = state
        .rag_store
        .scopes()
        .await
        .into_iter()
        .filter(|scope| scope != RESEARCH_SCOPE)
        .count();
    let ollama_reachable = state
        .llm
        .raw_provider(&settings.llm, ProviderKind::Ollama)
        .health_check()
        .await
        .unwrap_or(false);
    let sessions = state.history.list_sessions().await.len();
    let total_messages = state.history.get_total_message_count().await;

    Ok(Json(json!({
        "api_keys": keys,
        "langsmith_project": settings.langsmith.project,
        "default_provider": settings.llm.default_provider,
        "ollama_reachable": ollama_reachable,
        "embeddings": {
            "provider": settings.embeddings.provider,
            "model": settings.embeddings.model(),
        },
        "research_index": {
            "built": research_chunks.is_some(),
            "chunks": research_chunks.unwrap_or(0),
        },
        "session_indexes": session_indexes,
        "sessions": sessions,
        "total_messages": total_messages,
    })))
}
