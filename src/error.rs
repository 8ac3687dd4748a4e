use thiserror::Error;

/// Main error type for Reviewcraft operations
#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Repository resolution error: {0}")]
    Resolve(String),

    #[error("No files indexed: {0}")]
    NoFilesIndexed(String),

    #[error("Parser error: {0}")]
    Parser(String),

    #[error("Knowledge base unavailable: {0}")]
    KnowledgeUnavailable(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReviewError>;
