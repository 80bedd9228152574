//! History-aware RAG over the documents uploaded to one session.
//!
//! A turn runs in three steps:
//! 1. with prior history, the model rewrites the question into a standalone one
//! 2. the standalone question retrieves chunks from the session index
//! 3. the model answers from those chunks with the history in the prompt
//!
//! The (question, answer) pair is written to history only when step 3 succeeds.

use std::collections::HashMap;

use serde::Serialize;

use super::retrieval::join_context;
use crate::core::errors::ApiError;
use crate::history::{HistoryStore, MessageType};
use crate::llm::{ChatMessage, ChatModel, Embedder};
use crate::prompt::{
    ChatPromptTemplate, StrOutputParser, CONTEXTUALIZE_SYSTEM_PROMPT, SESSION_QA_SYSTEM_PROMPT,
};
use crate::rag::{RagStore, ScoredChunk};

#[derive(Debug, Clone, Serialize)]
pub struct ConversationalAnswer {
    pub answer: String,
    pub standalone_question: String,
    pub context: Vec<ScoredChunk>,
}

pub struct ConversationalRagChain {
    contextualize: ChatPromptTemplate,
    answer: ChatPromptTemplate,
    top_k: usize,
}

impl ConversationalRagChain {
    pub fn new(top_k: usize) -> Result<Self, ApiError> {
        Ok(Self {
            contextualize: ChatPromptTemplate::new(Some(CONTEXTUALIZE_SYSTEM_PROMPT), "{input}")?,
            answer: ChatPromptTemplate::new(Some(SESSION_QA_SYSTEM_PROMPT), "{input}")?,
            top_k,
        })
    }

    pub async fn run(
        &self,
        model: &ChatModel,
        embedder: &Embedder,
        store: &dyn RagStore,
        history: &HistoryStore,
        session_id: &str,
        question: &str,
    ) -> Result<ConversationalAnswer, ApiError> {
        let session_id = HistoryStore::validate_session_id(session_id)?;
        let question = question.trim();
        if question.is_empty() {
            return Err(ApiError::BadRequest("Please provide the user input".to_string()));
        }
        if store.count(session_id).await.is_none() {
            return Err(ApiError::BadRequest(
                "Please upload PDF files for this session first".to_string(),
            ));
        }

        let past: Vec<ChatMessage> = history
            .get_history(session_id, 0)
            .await
            .iter()
            .map(|m| m.to_chat_message())
            .collect();

        let standalone_question = if past.is_empty() {
            question.to_string()
        } else {
            let values = HashMap::from([("input", question)]);
            let messages = self.contextualize.format_messages(&values, &past)?;
            let rewritten = StrOutputParser.parse(&model.invoke(messages).await?);
            if rewritten.is_empty() {
                question.to_string()
            } else {
                rewritten
            }
        };
        tracing::debug!("Standalone question for {}: {}", session_id, standalone_question);

        let query = embedder.embed_query(&standalone_question).await?;
        let context = store
            .search(session_id, &query, self.top_k)
            .await?
            .unwrap_or_default();

        let joined = join_context(&context);
        let values = HashMap::from([("context", joined.as_str()), ("input", question)]);
        let messages = self.answer.format_messages(&values, &past)?;
        let answer = StrOutputParser.parse(&model.invoke(messages).await?);

        history
            .add_messages(
                session_id,
                &[(MessageType::Human, question), (MessageType::Ai, answer.as_str())],
            )
            .await;

        Ok(ConversationalAnswer {
            answer,
            standalone_question,
            context,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::config::settings::{ChainModel, EmbeddingSettings, LlmSettings};
    use crate::llm::testing::ScriptedProvider;
    use crate::llm::{LlmService, ModelChoice, ProviderKind};
    use crate::rag::{index_documents, Document, IndexMode, InMemoryRagStore, TextSplitter};

    struct Fixture {
        provider: Arc<ScriptedProvider>,
        model: ChatModel,
        embedder: Embedder,
        store: InMemoryRagStore,
        history: HistoryStore,
    }

    async fn fixture(provider: ScriptedProvider) -> Fixture {
        let provider = Arc::new(provider);
        let service = LlmService::new();
        service.register(ProviderKind::Ollama, provider.clone());
        let settings = LlmSettings::default();
        let choice = ModelChoice {
            provider: Some(ProviderKind::Ollama),
            ..Default::default()
        };
        let model = service
            .chat_model(&settings, &ChainModel::default(), &choice)
            .unwrap();
        let embedder = service
            .embedder(
                &settings,
                &EmbeddingSettings {
                    provider: ProviderKind::Ollama,
                    ..Default::default()
                },
            )
            .unwrap();

        let store = InMemoryRagStore::new();
        let docs = vec![Document::new("Rust ownership rules", "notes.pdf", Some(1))];
        let splitter = TextSplitter::new(5000, 500).unwrap();
        index_documents(&store, &embedder, &splitter, "s1", &docs, IndexMode::Append)
            .await
            .unwrap();

        Fixture {
            provider,
            model,
            embedder,
            store,
            history: HistoryStore::new(),
        }
    }

    async fn ask(f: &Fixture, question: &str) -> Result<ConversationalAnswer, ApiError> {
        ConversationalRagChain::new(4)
            .unwrap()
            .run(&f.model, &f.embedder, &f.store, &f.history, "s1", question)
            .await
    }

    #[tokio::test]
    async fn first_turn_skips_reformulation() {
        let f = fixture(ScriptedProvider::new(vec!["Ownership is tracked."])).await;

        let result = ask(&f, "What is ownership?").await.unwrap();

        assert_eq!(result.answer, "Ownership is tracked.");
        assert_eq!(result.standalone_question, "What is ownership?");
        assert_eq!(f.provider.calls(), 1);

        let request = f.provider.last_request().unwrap();
        assert_eq!(request.messages.len(), 2);
        assert!(request.messages[0].content.contains("Rust ownership rules"));
        assert_eq!(request.messages[1].content, "What is ownership?");
    }

    #[tokio::test]
    async fn later_turns_reformulate_with_history() {
        let f = fixture(ScriptedProvider::new(vec![
            "Ownership is tracked.",
            "How does Rust ownership move values?",
            "Values move on assignment.",
        ]))
        .await;

        ask(&f, "What is ownership?").await.unwrap();
        let result = ask(&f, "How does it move values?").await.unwrap();

        assert_eq!(f.provider.calls(), 3);
        assert_eq!(
            result.standalone_question,
            "How does Rust ownership move values?"
        );
        assert_eq!(result.answer, "Values move on assignment.");

        let requests = f.provider.requests();
        let rewrite = &requests[1].messages;
        assert_eq!(rewrite[0].content, CONTEXTUALIZE_SYSTEM_PROMPT);
        assert_eq!(rewrite[1].content, "What is ownership?");
        assert_eq!(rewrite[2].content, "Ownership is tracked.");
        assert_eq!(rewrite[3].content, "How does it move values?");

        let answer = &requests[2].messages;
        assert_eq!(answer.len(), 4);
        assert_eq!(answer[3].content, "How does it move values?");
    }

    #[tokio::test]
    async fn history_grows_by_one_turn_per_answer() {
        let f = fixture(ScriptedProvider::new(vec!["a1", "q2 rewritten", "a2"])).await;

        ask(&f, "q1").await.unwrap();
        assert_eq!(f.history.get_history("s1", 0).await.len(), 2);

        ask(&f, "q2").await.unwrap();
        let stored = f.history.get_history("s1", 0).await;
        assert_eq!(stored.len(), 4);
        assert_eq!(stored[2].message_type, MessageType::Human);
        assert_eq!(stored[2].content, "q2");
        assert_eq!(stored[3].content, "a2");
    }

    #[tokio::test]
    async fn failed_answer_leaves_history_untouched() {
        let f = fixture(ScriptedProvider::failing("backend down")).await;

        let err = ask(&f, "anything").await.unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
        assert!(f.history.get_history("s1", 0).await.is_empty());
    }

    #[tokio::test]
    async fn session_without_documents_is_rejected() {
        let f = fixture(ScriptedProvider::new(vec!["unused"])).await;

        let err = ConversationalRagChain::new(4)
            .unwrap()
            .run(&f.model, &f.embedder, &f.store, &f.history, "other", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(f.provider.calls(), 0);
    }
}
