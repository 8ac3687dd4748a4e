use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::{ChunkingConfig, StorageConfig};
use crate::error::{ReviewError, Result};
use super::super::indexer::FileRecord;
use super::super::patterns::CodebasePatterns;
use super::chunker::split_text;
use super::embeddings::EmbeddingBackend;
use super::index::{IndexedChunk, SimilarCode, VectorIndex};
use super::write_atomic;

const PATTERNS_FILE: &str = "patterns.json";
const INDEX_FILE: &str = "index.bin";
const MANIFEST_FILE: &str = "manifest.json";

/// Batch size for embedding requests
const EMBED_BATCH: usize = 64;

/// What a learn operation managed to persist. A missing index is degraded
/// capability, not failure.
#[derive(Debug, Clone)]
pub struct LearnOutcome {
    pub chunks_indexed: usize,
    pub index_built: bool,
}

/// What a load operation managed to restore. Overall success requires the
/// patterns only; the index merely enables retrieval.
#[derive(Debug, Clone, Copy)]
pub struct LoadOutcome {
    pub patterns_loaded: bool,
    pub index_loaded: bool,
}

/// Snapshot bookkeeping written next to the pattern document.
#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    learned_at: String,
    file_count: usize,
    chunk_count: usize,
    /// relative path -> sha256 of the learned content
    files: BTreeMap<String, String>,
}

/// Owner of the persisted pattern/embedding state for one storage path.
/// Read paths (detection, synthesis) only ever borrow it.
pub struct KnowledgeStore {
    root: PathBuf,
    chunking: ChunkingConfig,
    embedder: Option<Box<dyn EmbeddingBackend>>,
    patterns: Option<CodebasePatterns>,
    index: Option<VectorIndex>,
}

impl KnowledgeStore {
    pub fn new(
        storage: &StorageConfig,
        chunking: &ChunkingConfig,
        embedder: Option<Box<dyn EmbeddingBackend>>,
    ) -> Self {
        Self {
            root: storage.root.clone(),
            chunking: chunking.clone(),
            embedder,
            patterns: None,
            index: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn patterns(&self) -> Option<&CodebasePatterns> {
        self.patterns.as_ref()
    }

    /// Whether a learned knowledge base already exists at the storage path.
    pub fn exists(&self) -> bool {
        self.root.join(PATTERNS_FILE).exists()
    }

    /// Chunk and embed the file set, then persist the similarity index, the
    /// pattern document, and the manifest. Embedding is best-effort: with no
    /// backend, patterns still persist and the outcome reports a skipped
    /// index.
    pub async fn learn(
        &mut self,
        files: &[FileRecord],
        patterns: CodebasePatterns,
    ) -> Result<LearnOutcome> {
        std::fs::create_dir_all(&self.root)?;

        let mut outcome = LearnOutcome {
            chunks_indexed: 0,
            index_built: false,
        };

        match &self.embedder {
            Some(embedder) => match Self::build_index(embedder.as_ref(), files, &self.chunking).await {
                Ok(index) => {
                    index.save(&self.root.join(INDEX_FILE))?;
                    outcome.chunks_indexed = index.len();
                    outcome.index_built = true;
                    info!("Similarity index built with {} chunks", index.len());
                    self.index = Some(index);
                }
                Err(e) => {
                    warn!("Failed to build similarity index: {}", e);
                    warn!("Continuing with patterns only");
                }
            },
            None => {
                debug!("No embedding backend configured; skipping similarity index");
            }
        }

        // Canonical document: struct field order plus sorted map keys make
        // repeated learns over identical input byte-identical
        let document = serde_json::to_vec_pretty(&patterns)?;
        write_atomic(&self.root.join(PATTERNS_FILE), &document)?;
        info!("Patterns stored to {}", self.root.join(PATTERNS_FILE).display());

        let manifest = Manifest {
            learned_at: chrono::Utc::now().to_rfc3339(),
            file_count: files.len(),
            chunk_count: outcome.chunks_indexed,
            files: files
                .iter()
                .map(|f| (f.relative_path.clone(), content_hash(&f.content)))
                .collect(),
        };
        write_atomic(
            &self.root.join(MANIFEST_FILE),
            &serde_json::to_vec_pretty(&manifest)?,
        )?;

        self.patterns = Some(patterns);
        Ok(outcome)
    }

    async fn build_index(
        embedder: &dyn EmbeddingBackend,
        files: &[FileRecord],
        chunking: &ChunkingConfig,
    ) -> Result<VectorIndex> {
        let mut pending: Vec<(String, usize, String)> = Vec::new();
        for file in files {
            let chunks = split_text(&file.content, chunking.chunk_size, chunking.chunk_overlap);
            for (i, chunk) in chunks.into_iter().enumerate() {
                pending.push((file.relative_path.clone(), i, chunk));
            }
        }

        if pending.is_empty() {
            return Err(ReviewError::Backend("no chunks to index".into()));
        }

        let mut index: Option<VectorIndex> = None;
        for batch in pending.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|(_, _, text)| text.clone()).collect();
            let vectors = embedder.embed_batch(&texts).await?;

            for ((file, chunk_idx, content), vector) in batch.iter().zip(vectors) {
                let index = index.get_or_insert_with(|| VectorIndex::new(vector.len()));
                index.add(IndexedChunk {
                    file: file.clone(),
                    chunk: *chunk_idx,
                    content: content.clone(),
                    vector,
                })?;
            }
        }

        index.ok_or_else(|| ReviewError::Backend("embedding produced no vectors".into()))
    }

    /// Restore patterns and index from the storage path. Patterns decide the
    /// overall flag; a missing or corrupt index only disables retrieval.
    pub fn load(&mut self) -> LoadOutcome {
        let patterns_path = self.root.join(PATTERNS_FILE);
        let patterns_loaded = match std::fs::read_to_string(&patterns_path) {
            Ok(document) => match serde_json::from_str::<CodebasePatterns>(&document) {
                Ok(patterns) => {
                    self.patterns = Some(patterns);
                    info!("Patterns loaded from {}", patterns_path.display());
                    true
                }
                Err(e) => {
                    warn!("Failed to parse patterns at {}: {}", patterns_path.display(), e);
                    false
                }
            },
            Err(e) => {
                warn!("Patterns file not readable at {}: {}", patterns_path.display(), e);
                false
            }
        };

        let index_path = self.root.join(INDEX_FILE);
        let index_loaded = match VectorIndex::load(&index_path) {
            Ok(index) => {
                info!("Similarity index loaded with {} chunks", index.len());
                self.index = Some(index);
                true
            }
            Err(e) => {
                debug!("Similarity index not loaded from {}: {}", index_path.display(), e);
                false
            }
        };

        LoadOutcome {
            patterns_loaded,
            index_loaded,
        }
    }

    /// Up to `k` nearest chunks to the snippet. No index or no embedding
    /// backend means an empty result, not an error.
    pub async fn retrieve_similar(&self, snippet: &str, k: usize) -> Result<Vec<SimilarCode>> {
        let Some(index) = &self.index else {
            debug!("Similarity index not available; returning no context");
            return Ok(Vec::new());
        };
        let Some(embedder) = &self.embedder else {
            debug!("No embedding backend configured; returning no context");
            return Ok(Vec::new());
        };

        let query = embedder.embed(snippet).await?;
        Ok(index.search(&query, k))
    }
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::config::Config;
    use crate::core::patterns::{
        Indentation, LineLengthStats, NamingPreferences, StylePatterns,
    };

    /// Deterministic toy embedder: letter-frequency histogram over a-z.
    struct HistogramEmbedder;

    #[async_trait]
    impl EmbeddingBackend for HistogramEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|text| {
                    let mut histogram = vec![0.0f32; 26];
                    for c in text.chars().filter(|c| c.is_ascii_lowercase()) {
                        histogram[(c as usize) - ('a' as usize)] += 1.0;
                    }
                    histogram
                })
                .collect())
        }

        fn model_name(&self) -> &str {
            "histogram-test"
        }
    }

    fn sample_patterns() -> CodebasePatterns {
        CodebasePatterns {
            style: Some(StylePatterns {
                indentation: Indentation::Spaces(4),
                line_length: LineLengthStats {
                    average: 60,
                    preferred_max: 100,
                },
                naming_conventions: NamingPreferences::default(),
            }),
            architecture: None,
            functional: None,
        }
    }

    fn record(path: &str, content: &str) -> FileRecord {
        FileRecord {
            relative_path: path.to_string(),
            content: content.to_string(),
            extension: ".py".to_string(),
        }
    }

    fn store_at(root: &Path, embedder: Option<Box<dyn EmbeddingBackend>>) -> KnowledgeStore {
        let config = Config::default();
        KnowledgeStore::new(
            &StorageConfig {
                root: root.to_path_buf(),
            },
            &config.chunking,
            embedder,
        )
    }

    #[tokio::test]
    async fn test_learn_without_backend_is_patterns_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_at(dir.path(), None);

        let outcome = store
            .learn(&[record("a.py", "x = 1\n")], sample_patterns())
            .await
            .unwrap();

        assert!(!outcome.index_built);
        assert_eq!(outcome.chunks_indexed, 0);
        assert!(store.exists());
        assert!(store.retrieve_similar("x = 1", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_learn_load_round_trip_is_bit_for_bit() {
        let dir = tempfile::tempdir().unwrap();
        let patterns = sample_patterns();

        let mut writer = store_at(dir.path(), None);
        writer
            .learn(&[record("a.py", "x = 1\n")], patterns.clone())
            .await
            .unwrap();

        let mut reader = store_at(dir.path(), None);
        let outcome = reader.load();
        assert!(outcome.patterns_loaded);
        assert!(!outcome.index_loaded);
        assert_eq!(reader.patterns(), Some(&patterns));
    }

    #[tokio::test]
    async fn test_repeated_learn_produces_identical_documents() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let files = vec![record("a.py", "x = 1\n")];

        store_at(dir_a.path(), None)
            .learn(&files, sample_patterns())
            .await
            .unwrap();
        store_at(dir_b.path(), None)
            .learn(&files, sample_patterns())
            .await
            .unwrap();

        let doc_a = std::fs::read(dir_a.path().join(PATTERNS_FILE)).unwrap();
        let doc_b = std::fs::read(dir_b.path().join(PATTERNS_FILE)).unwrap();
        assert_eq!(doc_a, doc_b);
    }

    #[tokio::test]
    async fn test_index_round_trip_preserves_retrieval() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            record("alpha.py", "aaaa bbbb"),
            record("zulu.py", "zzzz yyyy"),
        ];

        let mut writer = store_at(dir.path(), Some(Box::new(HistogramEmbedder)));
        let outcome = writer.learn(&files, sample_patterns()).await.unwrap();
        assert!(outcome.index_built);
        assert_eq!(outcome.chunks_indexed, 2);

        let live = writer.retrieve_similar("aaa", 1).await.unwrap();

        let mut reader = store_at(dir.path(), Some(Box::new(HistogramEmbedder)));
        assert!(reader.load().index_loaded);
        let restored = reader.retrieve_similar("aaa", 1).await.unwrap();

        assert_eq!(live[0].file, "alpha.py");
        assert_eq!(restored[0].file, live[0].file);
        assert_eq!(restored[0].chunk, live[0].chunk);
    }

    #[tokio::test]
    async fn test_load_reports_missing_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_at(dir.path(), None);
        let outcome = store.load();
        assert!(!outcome.patterns_loaded);
        assert!(store.patterns().is_none());
    }
}
