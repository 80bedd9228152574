use super::document::Document;
use super::splitter::TextSplitter;
use super::store::RagStore;
use crate::core::errors::ApiError;
use crate::llm::Embedder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    Replace,
    Append,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct IndexReport {
    pub documents: usize,
    pub chunks: usize,
    pub index_size: usize,
}

/// Split, embed, then store. Embedding happens before the store is touched,
/// so a failed embedding call leaves the existing index as it was.
pub async fn index_documents(
    store: &dyn RagStore,
    embedder: &Embedder,
    splitter: &TextSplitter,
    scope: &str,
    documents: &[Document],
    mode: IndexMode,
) -> Result<IndexReport, ApiError> {
    let chunks = splitter.split_documents(documents);
    if chunks.is_empty() {
        return Err(ApiError::BadRequest(
            "No text could be extracted from the documents".to_string(),
        ));
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    tracing::info!(
        "Embedding {} chunks from {} documents with {}/{}",
        texts.len(),
        documents.len(),
        embedder.kind,
        embedder.model
    );
    let embeddings = embedder.embed_documents(&texts).await?;

    let chunk_count = chunks.len();
    let index_size = match mode {
        IndexMode::Replace => store.replace(scope, chunks, embeddings).await?,
        IndexMode::Append => store.append(scope, chunks, embeddings).await?,
    };

    Ok(IndexReport {
        documents: documents.len(),
        chunks: chunk_count,
        index_size,
    })
}
