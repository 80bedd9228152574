use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::chains::SummarizeChain;
use crate::core::errors::ApiError;
use crate::llm::ModelChoice;
use crate::loaders::{load_url, validate_url};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub url: String,
    #[serde(flatten)]
    pub choice: ModelChoice,
}

pub async fn summarize(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SummarizeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Reject bad input before a model client or a fetch is attempted.
    validate_url(&payload.url)?;

    let settings = state.config.settings()?;
    let model = state
        .llm
        .chat_model(&settings.llm, &settings.summarize.model, &payload.choice)?;
    let chain = SummarizeChain::new(&settings.summarize)?;

    let (source, documents) = load_url(&payload.url, &settings.summarize).await?;
    let output = chain.run(&model, &documents).await?;
    tracing::info!(
        "Summarized {} ({} chunks, {} collapse rounds)",
        payload.url.trim(),
        output.chunks,
        output.collapse_rounds
    );

    Ok(Json(json!({
        "summary": output.summary,
        "source": source,
        "chunks": output.chunks,
        "provider": model.kind,
        "model": model.model,
    })))
}
