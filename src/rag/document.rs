//! Documents and the loaders that produce them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source: String,
    pub page: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(content: impl Into<String>, source: impl Into<String>, page: Option<usize>) -> Self {
        Self {
            page_content: content.into(),
            metadata: DocumentMetadata {
                source: source.into(),
                page,
            },
        }
    }
}

/// Splits extracted PDF text into per-page documents on form feeds.
pub fn pages_to_documents(text: &str, source: &str) -> Vec<Document> {
    if !text.contains('\u{c}') {
        if text.trim().is_empty() {
            return Vec::new();
        }
        return vec![Document::new(text, source, None)];
    }

    text.split('\u{c}')
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(index, page)| Document::new(page, source, Some(index + 1)))
        .collect()
}

pub async fn load_pdf_bytes(source: &str, bytes: Vec<u8>) -> Result<Vec<Document>, ApiError> {
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        // the extractor panics on some malformed files
        .map_err(|e| ApiError::BadRequest(format!("Could not read PDF '{}': {}", source, e)))?
        .map_err(|e| ApiError::BadRequest(format!("Could not read PDF '{}': {}", source, e)))?;

    let documents = pages_to_documents(&text, source);
    tracing::debug!("Loaded {} page(s) from {}", documents.len(), source);
    Ok(documents)
}

pub async fn load_pdf_file(path: &Path) -> Result<Vec<Document>, ApiError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to read {}: {}", path.display(), e)))?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    load_pdf_bytes(&source, bytes).await
}

/// PDF files directly inside `dir`, sorted by name.
pub fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>, ApiError> {
    if !dir.is_dir() {
        return Err(ApiError::NotFound(format!(
            "Documents directory not found: {}",
            dir.display()
        )));
    }

    let entries = std::fs::read_dir(dir).map_err(ApiError::internal)?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Loads every PDF in `dir` and keeps the first `max_documents` pages.
/// Unreadable files are skipped with a warning.
pub async fn load_pdf_directory(dir: &Path, max_documents: usize) -> Result<Vec<Document>, ApiError> {
    let mut documents = Vec::new();
    for path in list_pdfs(dir)? {
        match load_pdf_file(&path).await {
            Ok(docs) => documents.extend(docs),
            Err(err) => tracing::warn!("Skipping {}: {}", path.display(), err),
        }
        if documents.len() >= max_documents {
            break;
        }
    }
    documents.truncate(max_documents);
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_feeds_become_numbered_pages() {
        let docs = pages_to_documents("intro\u{c}\u{c}methods\u{c}", "paper.pdf");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.page, Some(1));
        assert_eq!(docs[1].page_content, "methods");
        assert_eq!(docs[1].metadata.page, Some(3));
    }

    #[test]
    fn text_without_form_feeds_is_one_document() {
        let docs = pages_to_documents("whole text", "a.pdf");
        assert_eq!(docs, vec![Document::new("whole text", "a.pdf", None)]);
        assert!(pages_to_documents("  ", "a.pdf").is_empty());
    }

    #[test]
    fn list_pdfs_filters_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt"] {
            std::fs::write(tmp.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(tmp.path().join("nested.pdf")).unwrap();

        let files = list_pdfs(tmp.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }

    #[test]
    fn missing_directory_is_not_found() {
        let err = list_pdfs(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn invalid_pdf_bytes_are_a_bad_request() {
        let err = load_pdf_bytes("broken.pdf", b"not a pdf".to_vec()).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert!(err.to_string().contains("broken.pdf"));
    }

    #[tokio::test]
    async fn unreadable_pdfs_in_a_directory_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("broken.pdf"), b"garbage").unwrap();

        let docs = load_pdf_directory(tmp.path(), 50).await.unwrap();
        assert!(docs.is_empty());
    }
}
