use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use super::chat::QuestionRequest;
use crate::chains::RetrievalQaChain;
use crate::core::errors::ApiError;
use crate::rag::document::load_pdf_directory;
use crate::rag::{index_documents, IndexMode, TextSplitter, RESEARCH_SCOPE};
use crate::state::AppState;

/// Rebuilds the research index from the configured documents directory.
pub async fn build_index(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let settings = state.config.settings()?;
    let embedder = state.llm.embedder(&settings.llm, &settings.embeddings)?;
    let splitter = TextSplitter::from_settings(&settings.rag.research_chunking)?;

    let dir = state.paths.resolve(&settings.rag.documents_dir);
    let documents = load_pdf_directory(&dir, settings.rag.max_documents).await?;
    if documents.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "No readable PDF documents found in {}",
            dir.display()
        )));
    }

    let report = index_documents(
        state.rag_store.as_ref(),
        &embedder,
        &splitter,
        RESEARCH_SCOPE,
        &documents,
        IndexMode::Replace,
    )
    .await?;
    tracing::info!(
        "Research index built: {} chunks from {} pages",
        report.chunks,
        report.documents
    );

    Ok(Json(json!({
        "status": "ready",
        "message": "Vector Database is ready",
        "documents": report.documents,
        "chunks": report.chunks,
    })))
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QuestionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.config.settings()?;
    let model = state
        .llm
        .chat_model(&settings.llm, &settings.rag.research_model, &payload.choice)?;
    let embedder = state.llm.embedder(&settings.llm, &settings.embeddings)?;

    let result = RetrievalQaChain::new(settings.rag.top_k)?
        .run(&model, &embedder, state.rag_store.as_ref(), &payload.question)
        .await?;

    Ok(Json(json!({
        "answer": result.answer,
        "context": result.context,
        "elapsed_ms": result.elapsed_ms,
        "provider": model.kind,
        "model": model.model,
    })))
}
