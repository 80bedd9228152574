use std::cmp::Ordering;

use serde::Serialize;

use super::splitter::TextChunk;
use crate::core::errors::ApiError;

/// Chunks and their embeddings, searched by cosine similarity.
///
/// Entries map 1:1 to chunks; every vector has the dimension of the first one inserted.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<(TextChunk, Vec<f32>)>,
    dimension: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub score: f32,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds all chunks or none of them.
    pub fn add(&mut self, chunks: Vec<TextChunk>, embeddings: Vec<Vec<f32>>) -> Result<(), ApiError> {
        if chunks.len() != embeddings.len() {
            return Err(ApiError::BadRequest(format!(
                "Got {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let mut dimension = self.dimension;
        for embedding in &embeddings {
            if embedding.is_empty() {
                return Err(ApiError::BadRequest("Embeddings must not be empty".to_string()));
            }
            match dimension {
                Some(dim) if dim != embedding.len() => {
                    return Err(ApiError::BadRequest(format!(
                        "Vector length mismatch: {} != {}",
                        embedding.len(),
                        dim
                    )));
                }
                Some(_) => {}
                None => dimension = Some(embedding.len()),
            }
        }

        self.dimension = dimension;
        self.entries.extend(chunks.into_iter().zip(embeddings));
        Ok(())
    }

    /// Top `k` chunks by cosine similarity; ties keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, ApiError> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(dim) = self.dimension {
            if query.len() != dim {
                return Err(ApiError::BadRequest(format!(
                    "Vector length mismatch: {} != {}",
                    query.len(),
                    dim
                )));
            }
        }

        let candidates: Vec<&[f32]> = self.entries.iter().map(|(_, v)| v.as_slice()).collect();
        let ranked = rank_descending_by_cosine(query, &candidates);

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(idx, score)| ScoredChunk {
                chunk: self.entries[idx].0.clone(),
                score,
            })
            .collect())
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a <= f64::EPSILON || norm_b <= f64::EPSILON {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0) as f32
}

fn rank_descending_by_cosine(query: &[f32], candidates: &[&[f32]]) -> Vec<(usize, f32)> {
    let mut scores: Vec<(usize, f32)> = candidates
        .iter()
        .enumerate()
        .map(|(idx, candidate)| (idx, cosine_similarity(query, candidate)))
        .collect();

    // stable: equal scores stay in insertion order
    scores.sort_by(|left, right| right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal));
    scores
}
