use std::collections::HashMap;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;

use crate::core::config::settings::SummarizeSettings;
use crate::core::errors::ApiError;
use crate::llm::ChatModel;
use crate::prompt::{summary_prompt, ChatPromptTemplate, StrOutputParser};
use crate::rag::{Document, TextSplitter};

#[derive(Debug, Clone, Serialize)]
pub struct SummaryOutput {
    pub summary: String,
    pub chunks: usize,
    pub collapse_rounds: usize,
}

/// Map-reduce summarization: every chunk, then the collapsed summaries,
/// then one final combine, all through the same prompt.
pub struct SummarizeChain {
    prompt: ChatPromptTemplate,
    splitter: TextSplitter,
    collapse_max_chars: usize,
    concurrency: usize,
}

impl SummarizeChain {
    pub fn new(settings: &SummarizeSettings) -> Result<Self, ApiError> {
        Ok(Self {
            prompt: ChatPromptTemplate::new(None, &summary_prompt(settings.summary_words))?,
            splitter: TextSplitter::from_settings(&settings.chunking)?,
            collapse_max_chars: settings.collapse_max_chars.max(1),
            concurrency: settings.map_concurrency.max(1),
        })
    }

    pub async fn run(
        &self,
        model: &ChatModel,
        documents: &[Document],
    ) -> Result<SummaryOutput, ApiError> {
        let chunks: Vec<String> = self
            .splitter
            .split_documents(documents)
            .into_iter()
            .map(|c| c.text)
            .collect();
        if chunks.is_empty() {
            return Err(ApiError::BadRequest(
                "There is no text to summarize".to_string(),
            ));
        }
        let chunk_count = chunks.len();
        tracing::info!("Summarizing {} chunks", chunk_count);

        let mut summaries = self.map(model, chunks).await?;

        let mut collapse_rounds = 0;
        while summaries.len() > 1 && joined_len(&summaries) > self.collapse_max_chars {
            let groups = group_under_limit(&summaries, self.collapse_max_chars);
            if groups.len() == summaries.len() {
                // Every summary is over the limit by itself.
                break;
            }
            summaries = self.map(model, groups).await?;
            collapse_rounds += 1;
        }

        let summary = self.summarize_one(model, summaries.join("\n\n")).await?;
        Ok(SummaryOutput {
            summary,
            chunks: chunk_count,
            collapse_rounds,
        })
    }

    async fn map(&self, model: &ChatModel, texts: Vec<String>) -> Result<Vec<String>, ApiError> {
        stream::iter(texts)
            .map(|text| self.summarize_one(model, text))
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    async fn summarize_one(&self, model: &ChatModel, text: String) -> Result<String, ApiError> {
        let values = HashMap::from([("text", text.as_str())]);
        let messages = self.prompt.format_messages(&values, &[])?;
        Ok(StrOutputParser.parse(&model.invoke(messages).await?))
    }
}

fn joined_len(texts: &[String]) -> usize {
    let separators = texts.len().saturating_sub(1) * 2;
    texts.iter().map(|t| t.chars().count()).sum::<usize>() + separators
}

/// Consecutive groups whose joined length stays within `limit`; a single
/// oversized text forms its own group.
fn group_under_limit(texts: &[String], limit: usize) -> Vec<String> {
    let mut groups: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;

    for text in texts {
        let len = text.chars().count();
        if current.is_empty() {
            current_len = len;
        } else if current_len + len + 2 > limit {
            groups.push(std::mem::take(&mut current));
            current_len = len;
        } else {
            current_len += len + 2;
        }
        current.push(text);
    }
    if !current.is_empty() {
        groups.push(current);
    }

    groups.into_iter().map(|g| g.join("\n\n")).collect()
}
