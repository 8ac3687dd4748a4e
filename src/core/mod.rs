mod engine;
mod resolver;
mod indexer;
mod extractor;
mod patterns;
mod detector;
mod recommend;
mod diff;

// Knowledge base: chunking, embeddings, similarity index, persistence
mod knowledge;

// Language-specific source analyzers
mod languages;

// Generative recommendation backends
mod llm;

pub use resolver::SourceResolver;
pub use indexer::{FileIndexer, FileRecord, IndexDiagnostics, IndexOutcome};
pub use extractor::PatternExtractor;
pub use patterns::{
    ArchitecturePatterns, CodebasePatterns, FunctionalPatterns, Indentation, LineLengthStats,
    NamingConvention, NamingPreferences, StylePatterns,
};
pub use knowledge::{
    create_embedder, EmbeddingBackend, HttpEmbedder, KnowledgeStore, LearnOutcome, LoadOutcome,
    SimilarCode, VectorIndex,
};
pub use detector::{Analysis, Issue, IssueDetector, IssueKind, IssueReport, Severity};
pub use recommend::{Recommendation, RecommendationSynthesizer, Review};
pub use diff::unified_diff;
pub use llm::{
    create_generator, GeneratedRecommendation, GenerationRequest, Generator, OpenAiGenerator,
};

// Export the main engine
pub use engine::{Engine, LearnReport};
