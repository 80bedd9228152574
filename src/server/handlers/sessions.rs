use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use super::chat::QuestionRequest;
use crate::chains::ConversationalRagChain;
use crate::core::errors::ApiError;
use crate::history::{HistoryMessage, HistoryStore, MessageType};
use crate::rag::document::load_pdf_bytes;
use crate::rag::{index_documents, Document, IndexMode, TextSplitter};
use crate::state::AppState;

const DEFAULT_MESSAGE_LIMIT: usize = 100;
const UPLOAD_FIELD: &str = "files";

fn message_payload(messages: Vec<HistoryMessage>) -> Vec<Value> {
    messages
        .into_iter()
        .map(|msg| {
            let role = match msg.message_type {
                MessageType::Ai => "assistant",
                MessageType::Human => "user",
            };
            json!({
                "role": role,
                "type": msg.message_type,
                "content": msg.content,
                "timestamp": msg.created_at,
            })
        })
        .collect()
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state.history.list_sessions().await;
    let mut result: Vec<Value> = Vec::with_capacity(sessions.len());
    for session in sessions {
        let chunks = state.rag_store.count(&session.id).await.unwrap_or(0);
        result.push(json!({
            "id": session.id,
            "created_at": session.created_at,
            "updated_at": session.updated_at,
            "message_count": session.message_count,
            "preview": session.preview,
            "document_chunks": chunks,
        }));
    }
    Ok(Json(json!({"sessions": result})))
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = Uuid::new_v4().to_string();
    let session = state.history.ensure_session(&session_id).await;
    Ok(Json(json!({"session": session})))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = HistoryStore::validate_session_id(&session_id)?;
    let session = state
        .history
        .get_session(session_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;

    let messages = state
        .history
        .get_history(session_id, DEFAULT_MESSAGE_LIMIT)
        .await;
    let chunks = state.rag_store.count(session_id).await.unwrap_or(0);

    Ok(Json(json!({
        "session": session,
        "document_chunks": chunks,
        "messages": message_payload(messages),
    })))
}

pub async fn get_session_messages(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = HistoryStore::validate_session_id(&session_id)?;
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_MESSAGE_LIMIT);

    let messages = state.history.get_history(session_id, limit).await;
    Ok(Json(json!({"messages": message_payload(messages)})))
}

/// Drops both the chat history and the uploaded-document index.
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = HistoryStore::validate_session_id(&session_id)?;
    let had_history = state.history.delete_session(session_id).await;
    let had_index = state.rag_store.count(session_id).await.is_some();
    let removed_chunks = state.rag_store.remove(session_id).await;

    if !had_history && !had_index {
        return Err(ApiError::NotFound("Session not found".to_string()));
    }
    tracing::info!("Deleted session {}", session_id);
    Ok(Json(json!({"success": true, "removed_chunks": removed_chunks})))
}

/// Accepts one or more PDFs in the multipart field `files` and appends
/// them to the session's index.
pub async fn upload_documents(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = HistoryStore::validate_session_id(&session_id)?.to_string();
    let settings = state.config.settings()?;

    let mut files: Vec<String> = Vec::new();
    let mut documents: Vec<Document> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("upload-{}.pdf", files.len() + 1));
        if !file_name.to_ascii_lowercase().ends_with(".pdf") {
            return Err(ApiError::BadRequest(format!(
                "Only PDF files are supported: {}",
                file_name
            )));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {}", e)))?;

        documents.extend(load_pdf_bytes(&file_name, bytes.to_vec()).await?);
        files.push(file_name);
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest(
            "Please upload at least one PDF file".to_string(),
        ));
    }

    let embedder = state.llm.embedder(&settings.llm, &settings.embeddings)?;
    let splitter = TextSplitter::from_settings(&settings.rag.session_chunking)?;
    let report = index_documents(
        state.rag_store.as_ref(),
        &embedder,
        &splitter,
        &session_id,
        &documents,
        IndexMode::Append,
    )
    .await?;
    state.history.ensure_session(&session_id).await;

    tracing::info!(
        "Indexed {} files ({} chunks) for session {}",
        files.len(),
        report.chunks,
        session_id
    );
    Ok(Json(json!({
        "session_id": session_id,
        "files": files,
        "pages": report.documents,
        "chunks": report.chunks,
        "index_size": report.index_size,
    })))
}

pub async fn clear_documents(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = HistoryStore::validate_session_id(&session_id)?;
    let removed = state.rag_store.remove(session_id).await;
    Ok(Json(json!({"removed_chunks": removed})))
}

pub async fn session_chat(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(payload): Json<QuestionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.config.settings()?;
    let model = state
        .llm
        .chat_model(&settings.llm, &settings.rag.session_model, &payload.choice)?;
    let embedder = state.llm.embedder(&settings.llm, &settings.embeddings)?;

    let result = ConversationalRagChain::new(settings.rag.top_k)?
        .run(
            &model,
            &embedder,
            state.rag_store.as_ref(),
            &state.history,
            &session_id,
            &payload.question,
        )
        .await?;

    let session_id = HistoryStore::validate_session_id(&session_id)?;
    let messages = state.history.get_history(session_id, 0).await;
    Ok(Json(json!({
        "answer": result.answer,
        "standalone_question": result.standalone_question,
        "context": result.context,
        "messages": message_payload(messages),
    })))
}
