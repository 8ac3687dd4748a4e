use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{ReviewError, Result};
use super::detector::IssueDetector;
use super::diff::unified_diff;
use super::extractor::PatternExtractor;
use super::indexer::{file_extension, FileIndexer};
use super::knowledge::{create_embedder, KnowledgeStore};
use super::llm::{create_generator, Generator};
use super::recommend::{RecommendationSynthesizer, Review};
use super::resolver::SourceResolver;

/// What a learn run accomplished, for caller display.
#[derive(Debug, Clone)]
pub struct LearnReport {
    pub files_indexed: usize,
    pub chunks_indexed: usize,
    pub index_built: bool,
    pub storage_root: PathBuf,
}

/// Main orchestration engine: learn path (resolve, index, extract, persist)
/// and review path (detect, retrieve, synthesize).
pub struct Engine {
    config: Config,
    resolver: SourceResolver,
    indexer: FileIndexer,
    extractor: PatternExtractor,
    store: KnowledgeStore,
    detector: IssueDetector,
    synthesizer: RecommendationSynthesizer,
    generator: Option<Box<dyn Generator>>,
}

impl Engine {
    /// Create a new engine instance from configuration
    pub async fn new(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let config = Config::load_or_default(config_path)?;

        debug!("Loaded configuration: {:?}", config);

        let resolver = SourceResolver::new(&config.storage.root);
        let indexer = FileIndexer::new(&config.indexing);
        let extractor = PatternExtractor::new()?;
        let embedder = create_embedder(&config.embedding);
        let store = KnowledgeStore::new(&config.storage, &config.chunking, embedder);
        let detector = IssueDetector::new()?;
        let synthesizer = RecommendationSynthesizer::new();

        // Initialize the generative backend if enabled; failure downgrades
        // to deterministic-only reviews
        let generator = if config.llm.enabled {
            match create_generator(&config.llm) {
                Ok(generator) => {
                    info!(
                        "LLM integration enabled: {} ({})",
                        generator.provider_name(),
                        generator.model_name()
                    );
                    Some(generator)
                }
                Err(e) => {
                    warn!("Failed to initialize LLM generator: {}", e);
                    warn!("Continuing with deterministic recommendations only");
                    None
                }
            }
        } else {
            debug!("LLM integration disabled");
            None
        };

        Ok(Self {
            config,
            resolver,
            indexer,
            extractor,
            store,
            detector,
            synthesizer,
            generator,
        })
    }

    /// Learn conventions from a repository locator (local path or URL).
    pub async fn learn(&mut self, locator: &str, force: bool) -> Result<LearnReport> {
        if self.store.exists() && !force {
            return Err(ReviewError::Config(format!(
                "Knowledge base already exists at {}. Use --force to relearn.",
                self.store.root().display()
            )));
        }

        info!("Learning repository: {}", locator);

        let root = self.resolver.resolve(locator).await?;
        let outcome = self.indexer.index(&root)?;
        if outcome.files.is_empty() {
            return Err(ReviewError::NoFilesIndexed(outcome.diagnostics.to_string()));
        }

        let patterns = self.extractor.extract(&outcome.files);
        let learned = self.store.learn(&outcome.files, patterns).await?;

        info!("Repository learned successfully");
        Ok(LearnReport {
            files_indexed: outcome.files.len(),
            chunks_indexed: learned.chunks_indexed,
            index_built: learned.index_built,
            storage_root: self.store.root().to_path_buf(),
        })
    }

    /// Review a code snippet against the learned conventions.
    pub async fn review_code(&mut self, code: &str, file_path: &str) -> Result<Review> {
        self.ensure_knowledge()?;
        let patterns = match self.store.patterns() {
            Some(patterns) => patterns,
            None => {
                return Err(ReviewError::KnowledgeUnavailable(
                    "patterns missing after load".to_string(),
                ))
            }
        };

        let analysis = self
            .detector
            .analyze(code, file_path, patterns, &self.store)
            .await;
        Ok(self
            .synthesizer
            .synthesize(&analysis, file_path, self.generator.as_deref())
            .await)
    }

    /// Review the change between two versions of a file. The diff enables
    /// the generative pass when a backend is configured.
    pub async fn review_diff(
        &mut self,
        original: &str,
        updated: &str,
        file_path: &str,
    ) -> Result<Review> {
        self.ensure_knowledge()?;
        let patterns = match self.store.patterns() {
            Some(patterns) => patterns,
            None => {
                return Err(ReviewError::KnowledgeUnavailable(
                    "patterns missing after load".to_string(),
                ))
            }
        };

        let mut analysis = self
            .detector
            .analyze(updated, file_path, patterns, &self.store)
            .await;
        analysis.diff = Some(unified_diff(original, updated, file_path));

        Ok(self
            .synthesizer
            .synthesize(&analysis, file_path, self.generator.as_deref())
            .await)
    }

    /// Review a file on disk.
    pub async fn review_file(&mut self, path: &Path) -> Result<Review> {
        let code = std::fs::read_to_string(path)?;
        self.review_code(&code, &path.display().to_string()).await
    }

    /// Review every matching file in a directory.
    pub async fn review_dir(
        &mut self,
        dir: &Path,
        extensions: Option<Vec<String>>,
        recursive: bool,
    ) -> Result<BTreeMap<String, Review>> {
        let extensions: Vec<String> = extensions
            .unwrap_or_else(|| self.config.indexing.extensions.clone())
            .into_iter()
            .map(|ext| {
                let ext = ext.to_lowercase();
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{}", ext)
                }
            })
            .collect();

        let mut candidates: Vec<PathBuf> = Vec::new();
        if recursive {
            for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() {
                    candidates.push(entry.path().to_path_buf());
                }
            }
        } else {
            for entry in std::fs::read_dir(dir)? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    candidates.push(entry.path());
                }
            }
        }
        candidates.retain(|path| {
            extensions.contains(&file_extension(&path.to_string_lossy()))
        });
        candidates.sort();

        info!("Found {} files to review", candidates.len());

        let mut reviews = BTreeMap::new();
        for path in candidates {
            match self.review_file(&path).await {
                Ok(review) => {
                    reviews.insert(path.display().to_string(), review);
                }
                Err(e @ ReviewError::KnowledgeUnavailable(_)) => return Err(e),
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }
        Ok(reviews)
    }

    /// Lazily load the knowledge base on the first review. A failed load is
    /// a structured error the caller can render.
    fn ensure_knowledge(&mut self) -> Result<()> {
        if self.store.patterns().is_some() {
            return Ok(());
        }

        info!("Loading previously learned knowledge");
        let outcome = self.store.load();
        if !outcome.patterns_loaded {
            return Err(ReviewError::KnowledgeUnavailable(format!(
                "no learned patterns at {}; run `reviewcraft learn <repo>` first",
                self.store.root().display()
            )));
        }
        if !outcome.index_loaded {
            warn!("Similarity index unavailable; reviewing without retrieval context");
        }
        Ok(())
    }
}
