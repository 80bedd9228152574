use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::errors::ApiError;
use crate::llm::types::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Human,
    Ai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub message_type: MessageType,
    pub content: String,
    pub created_at: String,
}

impl HistoryMessage {
    pub fn to_chat_message(&self) -> ChatMessage {
        match self.message_type {
            MessageType::Human => ChatMessage::user(self.content.clone()),
            MessageType::Ai => ChatMessage::assistant(self.content.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
    pub message_count: usize,
    pub preview: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct SessionRecord {
    created_at: String,
    updated_at: String,
    messages: Vec<HistoryMessage>,
}

/// Chat history keyed by session id. Lives for the duration of the process.
#[derive(Clone, Default)]
pub struct HistoryStore {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

const PREVIEW_CHARS: usize = 80;

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session ids are user supplied; they only need to be non-blank.
    pub fn validate_session_id(session_id: &str) -> Result<&str, ApiError> {
        let trimmed = session_id.trim();
        if trimmed.is_empty() {
            return Err(ApiError::BadRequest("Session ID must not be empty".to_string()));
        }
        if trimmed.len() > 128 {
            return Err(ApiError::BadRequest("Session ID is too long".to_string()));
        }
        Ok(trimmed)
    }

    pub async fn ensure_session(&self, session_id: &str) -> SessionInfo {
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .entry(session_id.to_string())
            .or_insert_with(new_record);
        session_info(session_id, record)
    }

    pub async fn get_session(&self, session_id: &str) -> Option<SessionInfo> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .map(|record| session_info(session_id, record))
    }

    /// Most recently updated first.
    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.read().await;
        let mut infos: Vec<SessionInfo> = sessions
            .iter()
            .map(|(id, record)| session_info(id, record))
            .collect();
        infos.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        infos
    }

    pub async fn delete_session(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    /// Appends several messages under one lock so a turn is never split.
    pub async fn add_messages(&self, session_id: &str, messages: &[(MessageType, &str)]) {
        let now = chrono::Utc::now().to_rfc3339();
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .entry(session_id.to_string())
            .or_insert_with(new_record);
        for (message_type, content) in messages {
            record.messages.push(HistoryMessage {
                message_type: *message_type,
                content: content.to_string(),
                created_at: now.clone(),
            });
        }
        record.updated_at = now;
    }

    /// Last `limit` messages in chronological order; `0` means all.
    pub async fn get_history(&self, session_id: &str, limit: usize) -> Vec<HistoryMessage> {
        let sessions = self.sessions.read().await;
        let Some(record) = sessions.get(session_id) else {
            return Vec::new();
        };
        let skip = if limit > 0 {
            record.messages.len().saturating_sub(limit)
        } else {
            0
        };
        record.messages[skip..].to_vec()
    }

    pub async fn get_total_message_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .map(|record| record.messages.len())
            .sum()
    }
}

fn new_record() -> SessionRecord {
    let now = chrono::Utc::now().to_rfc3339();
    SessionRecord {
        created_at: now.clone(),
        updated_at: now,
        messages: Vec::new(),
    }
}

fn session_info(id: &str, record: &SessionRecord) -> SessionInfo {
    let preview = record
        .messages
        .iter()
        .find(|m| m.message_type == MessageType::Human)
        .map(|m| m.content.chars().take(PREVIEW_CHARS).collect());
    SessionInfo {
        id: id.to_string(),
        created_at: record.created_at.clone(),
        updated_at: record.updated_at.clone(),
        message_count: record.messages.len(),
        preview,
    }
}
