//! Fixed-size sliding-window text splitting.

use serde::{Deserialize, Serialize};

use super::document::Document;
use crate::core::config::settings::ChunkSettings;
use crate::core::errors::ApiError;

/// A text window cut from one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    /// The text content
    pub text: String,
    /// Source identifier (file name, URL, ...)
    pub source: String,
    /// 1-based page for PDF sources
    pub page: Option<usize>,
    /// Character offset in the original document
    pub start_offset: usize,
    /// Chunk index within the source document
    pub chunk_index: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ApiError> {
        if chunk_size == 0 {
            return Err(ApiError::BadRequest("chunk_size must be positive".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(ApiError::BadRequest(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_settings(settings: &ChunkSettings) -> Result<Self, ApiError> {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }

    /// Windows of `chunk_size` chars starting every `chunk_size - chunk_overlap`
    /// chars; the last window is the first one that reaches the end.
    pub fn split_text(&self, text: &str) -> Vec<(usize, String)> {
        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();
        let step = self.chunk_size - self.chunk_overlap;

        let mut windows = Vec::new();
        let mut start = 0;
        while start < total_chars {
            let end = (start + self.chunk_size).min(total_chars);
            let window: String = chars[start..end].iter().collect();
            if !window.trim().is_empty() {
                windows.push((start, window.trim().to_string()));
            }
            if end == total_chars {
                break;
            }
            start += step;
        }
        windows
    }

    pub fn split_documents(&self, documents: &[Document]) -> Vec<TextChunk> {
        documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.page_content)
                    .into_iter()
                    .enumerate()
                    .map(|(chunk_index, (start_offset, text))| TextChunk {
                        text,
                        source: doc.metadata.source.clone(),
                        page: doc.metadata.page,
                        start_offset,
                        chunk_index,
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_step_by_size_minus_overlap() {
        let splitter = TextSplitter::new(4, 1).unwrap();
        let windows = splitter.split_text("abcdefghij");

        let starts: Vec<usize> = windows.iter().map(|(s, _)| *s).collect();
        let texts: Vec<&str> = windows.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(starts, vec![0, 3, 6]);
        assert_eq!(texts, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let splitter = TextSplitter::new(1000, 200).unwrap();
        let windows = splitter.split_text("A short abstract.");
        assert_eq!(windows, vec![(0, "A short abstract.".to_string())]);
    }

    #[test]
    fn empty_and_blank_text_yield_nothing() {
        let splitter = TextSplitter::new(10, 2).unwrap();
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text("   \n\t ").is_empty());
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        assert!(TextSplitter::new(100, 100).is_err());
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(100, 99).is_ok());
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let splitter = TextSplitter::new(3, 1).unwrap();
        let windows = splitter.split_text("日本語のテキスト");
        assert_eq!(windows[0].1, "日本語");
        assert_eq!(windows[1].1, "語のテ");
    }

    #[test]
    fn split_documents_carries_source_and_page() {
        let splitter = TextSplitter::new(5, 0).unwrap();
        let docs = vec![
            Document::new("0123456789", "paper.pdf", Some(1)),
            Document::new("abc", "paper.pdf", Some(2)),
        ];

        let chunks = splitter.split_documents(&docs);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[1].start_offset, 5);
        assert_eq!(chunks[2].page, Some(2));
        assert_eq!(chunks[2].chunk_index, 0);
    }
}
