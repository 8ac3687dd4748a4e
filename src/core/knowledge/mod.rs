//! Persisted knowledge for one repository snapshot: the extracted pattern
//! document plus a similarity index over code chunks.

mod chunker;
mod embeddings;
mod index;
mod store;

pub use chunker::split_text;
pub use embeddings::{create_embedder, EmbeddingBackend, HttpEmbedder};
pub use index::{IndexedChunk, SimilarCode, VectorIndex};
pub use store::{KnowledgeStore, LearnOutcome, LoadOutcome};

use std::path::Path;

use crate::error::Result;

/// Write-then-rename so an interrupted write never leaves a partial file
/// behind.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
