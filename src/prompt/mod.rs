//! Prompt templates and the fixed prompts used by each chain.

mod template;

pub use template::{ChatPromptTemplate, PromptTemplate, StrOutputParser};

pub const CHATBOT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Please respond to the user queries";

pub const CHATBOT_HUMAN_PROMPT: &str = "Question:{question}";

pub const RESEARCH_QA_PROMPT: &str = "Answer the questions based on the provided context only.
Please provide the most accurate response based on the question
<context>
{context}
<context>
Question:{input}";

pub const CONTEXTUALIZE_SYSTEM_PROMPT: &str = "Given a chat history and the latest user question \
which might reference context in the chat history, formulate a standalone question which can be \
understood without the chat history. Do NOT answer the question, just reformulate it if needed \
and otherwise return it as is.";

pub const SESSION_QA_SYSTEM_PROMPT: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. If you don't know the \
answer, say that you don't know. Use three sentences maximum and keep the answer concise.

{context}";

/// `{words}` is filled from config before the template is parsed.
pub const SUMMARY_PROMPT: &str = "
Provide a summary of the following content in {words} words:
Content:{text}

";

pub fn summary_prompt(words: usize) -> String {
    SUMMARY_PROMPT.replace("{words}", &words.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn builtin_prompts_parse_with_expected_variables() {
        let research = PromptTemplate::new(RESEARCH_QA_PROMPT).unwrap();
        let err = research.format(&HashMap::new()).unwrap_err();
        assert!(err.to_string().ends_with("context, input"));

        let qa = PromptTemplate::new(SESSION_QA_SYSTEM_PROMPT).unwrap();
        assert!(qa.format(&HashMap::from([("context", "ctx")])).is_ok());

        assert!(PromptTemplate::new(CONTEXTUALIZE_SYSTEM_PROMPT)
            .unwrap()
            .format(&HashMap::new())
            .is_ok());
    }

    #[test]
    fn summary_prompt_embeds_word_count() {
        let prompt = PromptTemplate::new(&summary_prompt(300)).unwrap();
        let text = prompt.format(&HashMap::from([("text", "body")])).unwrap();
        assert!(text.contains("in 300 words"));
        assert!(text.contains("Content:body"));
    }
}
