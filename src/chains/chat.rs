use std::collections::HashMap;

use crate::core::errors::ApiError;
use crate::llm::ChatModel;
use crate::prompt::{
    ChatPromptTemplate, StrOutputParser, CHATBOT_HUMAN_PROMPT, CHATBOT_SYSTEM_PROMPT,
};

/// Plain question answering: prompt, model, string parser.
pub struct ChatChain {
    prompt: ChatPromptTemplate,
}

impl ChatChain {
    pub fn new() -> Result<Self, ApiError> {
        Ok(Self {
            prompt: ChatPromptTemplate::new(Some(CHATBOT_SYSTEM_PROMPT), CHATBOT_HUMAN_PROMPT)?,
        })
    }

    pub async fn run(&self, model: &ChatModel, question: &str) -> Result<String, ApiError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ApiError::BadRequest("Please provide the user input".to_string()));
        }

        let values = HashMap::from([("question", question)]);
        let messages = self.prompt.format_messages(&values, &[])?;
        let raw = model.invoke(messages).await?;
        Ok(StrOutputParser.parse(&raw))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::config::settings::{ChainModel, LlmSettings};
    use crate::llm::testing::ScriptedProvider;
    use crate::llm::{LlmService, ModelChoice, ProviderKind};

    fn model_with(provider: Arc<ScriptedProvider>) -> ChatModel {
        let service = LlmService::new();
        service.register(ProviderKind::Ollama, provider);
        let choice = ModelChoice {
            provider: Some(ProviderKind::Ollama),
            ..Default::default()
        };
        service
            .chat_model(&LlmSettings::default(), &ChainModel::default(), &choice)
            .unwrap()
    }

    #[tokio::test]
    async fn formats_system_and_question() {
        let provider = Arc::new(ScriptedProvider::new(vec!["  Paris.  "]));
        let model = model_with(provider.clone());

        let answer = ChatChain::new()
            .unwrap()
            .run(&model, "Capital of France?")
            .await
            .unwrap();

        assert_eq!(answer, "Paris.");
        let request = provider.last_request().unwrap();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[0].content, CHATBOT_SYSTEM_PROMPT);
        assert_eq!(request.messages[1].content, "Question:Capital of France?");
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.max_tokens, Some(150));
    }

    #[tokio::test]
    async fn blank_question_never_reaches_the_model() {
        let provider = Arc::new(ScriptedProvider::new(vec!["unused"]));
        let model = model_with(provider.clone());

        let err = ChatChain::new().unwrap().run(&model, "   ").await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn upstream_failures_propagate() {
        let provider = Arc::new(ScriptedProvider::failing("model offline"));
        let model = model_with(provider);

        let err = ChatChain::new().unwrap().run(&model, "hi").await.unwrap_err();
        assert!(matches!(err, ApiError::Upstream(ref m) if m == "model offline"));
    }
}
