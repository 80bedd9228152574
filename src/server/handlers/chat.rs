use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::chains::ChatChain;
use crate::core::config::settings::ChainModel;
use crate::core::errors::ApiError;
use crate::llm::{ModelChoice, ProviderKind};
use crate::state::AppState;

/// A question plus the model selection made in the UI.
#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
    #[serde(flatten)]
    pub choice: ModelChoice,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QuestionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.config.settings()?;
    let model = state
        .llm
        .chat_model(&settings.llm, &ChainModel::default(), &payload.choice)?;
    tracing::info!("Chat with {}/{}", model.kind, model.model);

    let answer = ChatChain::new()?.run(&model, &payload.question).await?;
    Ok(Json(json!({
        "answer": answer,
        "provider": model.kind,
        "model": model.model,
    })))
}

/// Static lists for the hosted providers; Ollama is asked for its installed
/// models and falls back to the configured list when it is not reachable.
pub async fn list_models(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.config.settings()?;
    let mut providers: Vec<Value> = Vec::new();

    for kind in ProviderKind::CHAT_PROVIDERS {
        let mut models = settings.llm.models(kind);
        let mut live = false;

        if kind == ProviderKind::Ollama {
            match state
                .llm
                .raw_provider(&settings.llm, kind)
                .list_models()
                .await
            {
                Ok(found) if !found.is_empty() => {
                    models = found.into_iter().map(|m| m.id).collect();
                    live = true;
                }
                Ok(_) => {}
                Err(err) => tracing::debug!("Ollama model listing failed: {}", err),
            }
        }

        providers.push(json!({
            "provider": kind,
            "models": models,
            "default_model": settings.llm.default_model(kind),
            "requires_api_key": kind.requires_api_key(),
            "api_key_configured": settings.llm.api_key(kind).is_some(),
            "live": live,
        }));
    }

    Ok(Json(json!({
        "default_provider": settings.llm.default_provider,
        "temperature": settings.llm.temperature,
        "max_tokens": settings.llm.max_tokens,
        "providers": providers,
    })))
}
