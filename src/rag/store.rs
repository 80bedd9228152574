//! RagStore trait: scope-keyed vector indexes.
//!
//! A scope is either the shared research index or a chat session id.
//! Everything lives in memory and is gone when the process exits.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::index::{ScoredChunk, VectorIndex};
use super::splitter::TextChunk;
use crate::core::errors::ApiError;

/// Scope name of the directory-built research index.
pub const RESEARCH_SCOPE: &str = "research";

#[async_trait]
pub trait RagStore: Send + Sync {
    /// Replace the scope's index with the given chunks.
    async fn replace(
        &self,
        scope: &str,
        chunks: Vec<TextChunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<usize, ApiError>;

    /// Add chunks to the scope's index, creating it if needed.
    async fn append(
        &self,
        scope: &str,
        chunks: Vec<TextChunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<usize, ApiError>;

    /// Search the scope; `None` when the scope has no index.
    async fn search(
        &self,
        scope: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Option<Vec<ScoredChunk>>, ApiError>;

    /// Drop the scope's index. Returns the number of chunks removed.
    async fn remove(&self, scope: &str) -> usize;

    /// Chunk count for the scope, `None` when it has no index.
    async fn count(&self, scope: &str) -> Option<usize>;

    /// All scopes that currently have an index.
    async fn scopes(&self) -> Vec<String>;
}

#[derive(Clone, Default)]
pub struct InMemoryRagStore {
    indexes: Arc<RwLock<HashMap<String, VectorIndex>>>,
}

impl InMemoryRagStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RagStore for InMemoryRagStore {
    async fn replace(
        &self,
        scope: &str,
        chunks: Vec<TextChunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<usize, ApiError> {
        let mut index = VectorIndex::new();
        index.add(chunks, embeddings)?;
        let size = index.len();

        self.indexes.write().await.insert(scope.to_string(), index);
        tracing::info!("Index '{}' rebuilt with {} chunks", scope, size);
        Ok(size)
    }

    async fn append(
        &self,
        scope: &str,
        chunks: Vec<TextChunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<usize, ApiError> {
        let mut indexes = self.indexes.write().await;
        let mut index = indexes.get(scope).cloned().unwrap_or_default();
        index.add(chunks, embeddings)?;
        let size = index.len();
        indexes.insert(scope.to_string(), index);
        tracing::info!("Index '{}' now holds {} chunks", scope, size);
        Ok(size)
    }

    async fn search(
        &self,
        scope: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Option<Vec<ScoredChunk>>, ApiError> {
        let indexes = self.indexes.read().await;
        match indexes.get(scope) {
            Some(index) => index.search(query_embedding, limit).map(Some),
            None => Ok(None),
        }
    }

    async fn remove(&self, scope: &str) -> usize {
        self.indexes
            .write()
            .await
            .remove(scope)
            .map(|index| index.len())
            .unwrap_or(0)
    }

    async fn count(&self, scope: &str) -> Option<usize> {
        self.indexes.read().await.get(scope).map(VectorIndex::len)
    }

    async fn scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = self.indexes.read().await.keys().cloned().collect();
        scopes.sort();
        scopes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> TextChunk {
        TextChunk {
            text: text.to_string(),
            source: "doc".to_string(),
            page: None,
            start_offset: 0,
            chunk_index: 0,
        }
    }

    #[tokio::test]
    async fn scopes_are_isolated() {
        let store = InMemoryRagStore::new();
        store
            .append("session-a", vec![chunk("alpha")], vec![vec![1.0, 0.0]])
            .await
            .unwrap();
        store
            .append("session-b", vec![chunk("beta")], vec![vec![0.0, 1.0]])
            .await
            .unwrap();

        let hits = store.search("session-a", &[0.0, 1.0], 4).await.unwrap().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.text, "alpha");
        assert!(store.search("missing", &[1.0, 0.0], 4).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn replace_discards_previous_entries() {
        let store = InMemoryRagStore::new();
        store
            .append(RESEARCH_SCOPE, vec![chunk("old")], vec![vec![1.0, 0.0]])
            .await
            .unwrap();
        let size = store
            .replace(RESEARCH_SCOPE, vec![chunk("new")], vec![vec![1.0, 0.0, 0.0]])
            .await
            .unwrap();

        assert_eq!(size, 1);
        let hits = store.search(RESEARCH_SCOPE, &[1.0, 0.0, 0.0], 4).await.unwrap().unwrap();
        assert_eq!(hits[0].chunk.text, "new");
    }

    #[tokio::test]
    async fn failed_append_leaves_index_unchanged() {
        let store = InMemoryRagStore::new();
        store.append("s", vec![chunk("a")], vec![vec![1.0]]).await.unwrap();
        assert!(store.append("s", vec![chunk("b")], vec![vec![1.0, 2.0]]).await.is_err());
        assert_eq!(store.count("s").await, Some(1));
    }

    #[tokio::test]
    async fn failed_first_append_creates_no_scope() {
        let store = InMemoryRagStore::new();
        assert!(store
            .append("fresh-session", vec![chunk("a")], vec![vec![]])
            .await
            .is_err());
        assert!(store
            .append("fresh-session", vec![chunk("a"), chunk("b")], vec![vec![1.0]])
            .await
            .is_err());

        assert_eq!(store.count("fresh-session").await, None);
        assert!(store.scopes().await.is_empty());
        assert_eq!(store.remove("fresh-session").await, 0);
    }

    #[tokio::test]
    async fn remove_reports_dropped_chunks() {
        let store = InMemoryRagStore::new();
        store
            .append("s", vec![chunk("a"), chunk("b")], vec![vec![1.0], vec![2.0]])
            .await
            .unwrap();

        assert_eq!(store.scopes().await, vec!["s".to_string()]);
        assert_eq!(store.remove("s").await, 2);
        assert_eq!(store.remove("s").await, 0);
        assert_eq!(store.count("s").await, None);
    }
}
