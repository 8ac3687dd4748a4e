//! Generative recommendation backends.
//!
//! A trait-based capability interface: the provider is selected once at
//! startup, and a missing backend simply means reviews stay deterministic.
//! Responses are untrusted JSON and get schema-validated entry by entry.

mod providers;

pub use providers::{create_generator, OpenAiGenerator};

use serde::Deserialize;

use crate::error::Result;
use super::detector::{IssueKind, Severity};
use super::knowledge::SimilarCode;

/// What a generation call carries: the change, its location, and up to a few
/// similar-code excerpts as repository context.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub diff: String,
    pub file_path: String,
    pub similar_code: Vec<SimilarCode>,
}

/// One schema-validated recommendation from the backend. Entries that fail
/// validation are discarded before this type is ever constructed.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedRecommendation {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub subtype: String,
    pub message: String,
    pub suggestion: String,
    pub severity: Severity,
    pub explanation: Option<String>,
}

/// Trait for backends that can review a diff
#[async_trait::async_trait]
pub trait Generator: Send + Sync {
    /// Generate recommendations for a change
    async fn review_diff(&self, request: &GenerationRequest) -> Result<Vec<GeneratedRecommendation>>;

    /// Get the provider name
    fn provider_name(&self) -> &str;

    /// Get the model name being used
    fn model_name(&self) -> &str;
}
