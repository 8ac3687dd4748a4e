use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ReviewError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Knowledge base storage settings
    pub storage: StorageConfig,

    /// Repository indexing settings
    pub indexing: IndexingConfig,

    /// Chunking policy for the similarity index
    pub chunking: ChunkingConfig,

    /// Embedding backend settings
    pub embedding: EmbeddingConfig,

    /// Generative LLM settings
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for the persisted knowledge base
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// File extensions to index (with leading dot, case-insensitive)
    pub extensions: Vec<String>,

    /// Directory names to skip, matched against whole path segments
    pub ignore_dirs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Whether to compute embeddings during learning
    pub enabled: bool,

    /// Embedding model name
    pub model: String,

    /// Base URL of an OpenAI-compatible embeddings endpoint
    pub base_url: String,

    /// API key for the embedding service
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Whether to request generative recommendations for diffs
    pub enabled: bool,

    /// LLM provider (openai-compatible)
    pub provider: String,

    /// Model name (e.g., "gpt-4o-mini", "llama-3.3-70b-versatile")
    pub model: String,

    /// API key (for external providers)
    pub api_key: Option<String>,

    /// Base URL (for custom endpoints)
    pub base_url: Option<String>,

    /// Maximum tokens for LLM responses
    pub max_tokens: Option<u32>,

    /// Temperature for LLM responses (0.0 to 1.0)
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                root: PathBuf::from("./knowledge"),
            },
            indexing: IndexingConfig {
                extensions: vec![
                    ".py", ".js", ".java", ".cpp", ".c", ".h", ".cs", ".php", ".rb", ".go",
                    ".rs", ".ts",
                ]
                .into_iter()
                .map(String::from)
                .collect(),
                ignore_dirs: vec![".git", "node_modules", "venv", "__pycache__", ".venv"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            },
            chunking: ChunkingConfig {
                chunk_size: 1000,
                chunk_overlap: 200,
            },
            embedding: EmbeddingConfig {
                enabled: false,
                model: "text-embedding-3-small".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: None,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                enabled: false,
                provider: "openai".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key: None,
                base_url: None,
                max_tokens: Some(2000),
                temperature: Some(0.3),
                timeout_secs: 60,
            },
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ReviewError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ReviewError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)?
                } else {
                    Self::default()
                }
            }
            None => {
                // Try common config file locations
                let candidates = [
                    "Reviewcraft.toml",
                    "reviewcraft.toml",
                    ".reviewcraft.toml",
                ];

                let mut loaded = None;
                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        loaded = Some(Self::load(candidate)?);
                        break;
                    }
                }
                loaded.unwrap_or_default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Fill credentials from the environment when the config file leaves them
    /// unset. Resolved once at startup; nothing else reads the environment.
    fn apply_env_overrides(&mut self) {
        if self.llm.api_key.is_none() {
            if let Ok(key) = std::env::var("REVIEWCRAFT_API_KEY") {
                self.llm.api_key = Some(key);
            }
        }
        if self.embedding.api_key.is_none() {
            if let Ok(key) = std::env::var("REVIEWCRAFT_EMBEDDING_API_KEY") {
                self.embedding.api_key = Some(key);
            }
        }
    }
}
