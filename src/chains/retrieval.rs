use std::collections::HashMap;
use std::time::Instant;

use serde::Serialize;

use crate::core::errors::ApiError;
use crate::llm::{ChatModel, Embedder};
use crate::prompt::{ChatPromptTemplate, StrOutputParser, RESEARCH_QA_PROMPT};
use crate::rag::{RagStore, ScoredChunk, RESEARCH_SCOPE};

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalAnswer {
    pub answer: String,
    pub context: Vec<ScoredChunk>,
    pub elapsed_ms: u64,
}

/// Single-turn question answering over the research index.
pub struct RetrievalQaChain {
    prompt: ChatPromptTemplate,
    top_k: usize,
}

impl RetrievalQaChain {
    pub fn new(top_k: usize) -> Result<Self, ApiError> {
        Ok(Self {
            prompt: ChatPromptTemplate::new(None, RESEARCH_QA_PROMPT)?,
            top_k,
        })
    }

    pub async fn run(
        &self,
        model: &ChatModel,
        embedder: &Embedder,
        store: &dyn RagStore,
        question: &str,
    ) -> Result<RetrievalAnswer, ApiError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ApiError::BadRequest("Please provide the user input".to_string()));
        }
        if store.count(RESEARCH_SCOPE).await.is_none() {
            return Err(ApiError::BadRequest(
                "Please build the document embeddings first".to_string(),
            ));
        }

        let started = Instant::now();
        let query = embedder.embed_query(question).await?;
        let context = store
            .search(RESEARCH_SCOPE, &query, self.top_k)
            .await?
            .ok_or_else(|| {
                ApiError::BadRequest("Please build the document embeddings first".to_string())
            })?;

        let joined = join_context(&context);
        let values = HashMap::from([("context", joined.as_str()), ("input", question)]);
        let messages = self.prompt.format_messages(&values, &[])?;
        let answer = StrOutputParser.parse(&model.invoke(messages).await?);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            "Research answer in {} ms from {} chunks",
            elapsed_ms,
            context.len()
        );
        Ok(RetrievalAnswer {
            answer,
            context,
            elapsed_ms,
        })
    }
}

/// Chunk texts in rank order, separated by blank lines.
pub fn join_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::config::settings::{ChainModel, EmbeddingSettings, LlmSettings};
    use crate::llm::testing::ScriptedProvider;
    use crate::llm::{LlmService, ModelChoice, ProviderKind};
    use crate::rag::{index_documents, Document, IndexMode, InMemoryRagStore, TextSplitter};

    fn wire(provider: Arc<ScriptedProvider>) -> (ChatModel, Embedder) {
        let service = LlmService::new();
        service.register(ProviderKind::Ollama, provider);
        let settings = LlmSettings::default();
        let choice = ModelChoice {
            provider: Some(ProviderKind::Ollama),
            ..Default::default()
        };
        let model = service
            .chat_model(&settings, &ChainModel::default(), &choice)
            .unwrap();
        let embeddings = EmbeddingSettings {
            provider: ProviderKind::Ollama,
            ..Default::default()
        };
        let embedder = service.embedder(&settings, &embeddings).unwrap();
        (model, embedder)
    }

    #[tokio::test]
    async fn querying_before_indexing_is_rejected() {
        let provider = Arc::new(ScriptedProvider::new(vec!["unused"]));
        let (model, embedder) = wire(provider.clone());
        let store = InMemoryRagStore::new();

        let err = RetrievalQaChain::new(4)
            .unwrap()
            .run(&model, &embedder, &store, "what is attention?")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("document embeddings first"));
        assert_eq!(provider.calls(), 0);
        assert_eq!(provider.embed_calls(), 0);
    }

    #[tokio::test]
    async fn stuffs_top_chunks_into_the_prompt() {
        let provider = Arc::new(ScriptedProvider::new(vec!["Self-attention."]));
        let (model, embedder) = wire(provider.clone());
        let store = InMemoryRagStore::new();

        let docs = vec![
            Document::new("zzzz zzzz zzzz", "b.pdf", Some(1)),
            Document::new("attention attention", "a.pdf", Some(1)),
            Document::new("qqqq", "c.pdf", Some(1)),
        ];
        let splitter = TextSplitter::new(1000, 200).unwrap();
        index_documents(&store, &embedder, &splitter, RESEARCH_SCOPE, &docs, IndexMode::Replace)
            .await
            .unwrap();

        let result = RetrievalQaChain::new(2)
            .unwrap()
            .run(&model, &embedder, &store, "attention")
            .await
            .unwrap();

        assert_eq!(result.answer, "Self-attention.");
        assert_eq!(result.context.len(), 2);
        assert_eq!(result.context[0].chunk.source, "a.pdf");

        let request = provider.last_request().unwrap();
        assert_eq!(request.messages.len(), 1);
        let prompt = &request.messages[0].content;
        assert!(prompt.contains("attention attention"));
        assert!(prompt.ends_with("Question:attention"));
        assert!(!prompt.contains("qqqq"));
    }

    #[test]
    fn context_is_joined_with_blank_lines() {
        let chunk = |text: &str| ScoredChunk {
            chunk: crate::rag::TextChunk {
                text: text.to_string(),
                source: "x".to_string(),
                page: None,
                start_offset: 0,
                chunk_index: 0,
            },
            score: 1.0,
        };
        assert_eq!(join_context(&[chunk("one"), chunk("two")]), "one\n\ntwo");
        assert_eq!(join_context(&[]), "");
    }
}
