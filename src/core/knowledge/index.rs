use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReviewError, Result};
use super::write_atomic;

/// One embedded chunk with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    /// Source file the chunk was cut from
    pub file: String,

    /// Position of the chunk within its source file
    pub chunk: usize,

    pub content: String,

    pub vector: Vec<f32>,
}

/// A retrieval hit. Ephemeral, scoped to one retrieval call.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarCode {
    pub content: String,
    pub file: String,
    pub chunk: usize,
    pub similarity: f32,
}

/// Brute-force cosine similarity index. The persisted payload is opaque
/// bincode; only the round-trip contract matters.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VectorIndex {
    dimension: usize,
    entries: Vec<IndexedChunk>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, chunk: IndexedChunk) -> Result<()> {
        if chunk.vector.len() != self.dimension {
            return Err(ReviewError::Backend(format!(
                "vector dimension {} does not match index dimension {}",
                chunk.vector.len(),
                self.dimension
            )));
        }
        self.entries.push(chunk);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Up to `k` nearest chunks by cosine similarity, most similar first.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SimilarCode> {
        let mut results: Vec<SimilarCode> = self
            .entries
            .iter()
            .map(|entry| SimilarCode {
                content: entry.content.clone(),
                file: entry.file.clone(),
                chunk: entry.chunk,
                similarity: cosine_similarity(query, &entry.vector),
            })
            .collect();

        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(k);
        results
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| ReviewError::Persistence(format!("failed to encode index: {}", e)))?;
        write_atomic(path, &bytes)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        bincode::deserialize(&bytes)
            .map_err(|e| ReviewError::Persistence(format!("failed to decode index: {}", e)))
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
