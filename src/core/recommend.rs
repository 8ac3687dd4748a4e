//! Turns detected issues plus retrieval context into the ranked
//! recommendation list.

use serde::Serialize;
use tracing::{info, warn};

use super::detector::{Analysis, Issue, IssueKind, Severity};
use super::llm::{GenerationRequest, GeneratedRecommendation, Generator};

/// One entry of the review document. `explanation` only appears on
/// generative recommendations and is omitted from JSON otherwise.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub subtype: String,
    pub message: String,
    pub suggestion: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// The review document: the system's primary externally consumed artifact.
#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub file: String,
    pub recommendations: Vec<Recommendation>,
}

/// Merges deterministic issues with optional generative recommendations and
/// ranks the result.
pub struct RecommendationSynthesizer;

impl RecommendationSynthesizer {
    pub fn new() -> Self {
        Self
    }

    pub async fn synthesize(
        &self,
        analysis: &Analysis,
        file_path: &str,
        generator: Option<&dyn Generator>,
    ) -> Review {
        info!("Generating recommendations for {}", file_path);

        let mut recommendations: Vec<Recommendation> = analysis
            .issues
            .iter()
            .map(|issue| Recommendation {
                kind: issue.kind,
                subtype: issue.subtype.clone(),
                message: issue.message.clone(),
                suggestion: suggestion_for(issue),
                severity: issue.severity,
                explanation: None,
            })
            .collect();

        // The generative pass only runs for diff reviews with a configured
        // backend; failures contribute zero recommendations
        if let (Some(generator), Some(diff)) = (generator, &analysis.diff) {
            let request = GenerationRequest {
                diff: diff.clone(),
                file_path: file_path.to_string(),
                similar_code: analysis.similar_code.iter().take(3).cloned().collect(),
            };
            match generator.review_diff(&request).await {
                Ok(generated) => {
                    recommendations.extend(generated.into_iter().map(Recommendation::from));
                }
                Err(e) => {
                    warn!("Generative recommendations unavailable: {}", e);
                }
            }
        }

        // Stable sort: high before medium before low, critical and info
        // trailing, original order preserved within each bucket
        recommendations.sort_by_key(|r| r.severity.rank());

        Review {
            file: file_path.to_string(),
            recommendations,
        }
    }
}

impl Default for RecommendationSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl From<GeneratedRecommendation> for Recommendation {
    fn from(generated: GeneratedRecommendation) -> Self {
        Self {
            kind: generated.kind,
            subtype: generated.subtype,
            message: generated.message,
            suggestion: generated.suggestion,
            severity: generated.severity,
            explanation: generated.explanation,
        }
    }
}

/// Closed suggestion lookup per category and subtype.
fn suggestion_for(issue: &Issue) -> String {
    let suggestion = match (issue.kind, issue.subtype.as_str()) {
        (IssueKind::Style, "indentation") => "Follow the project's indentation pattern.",
        (IssueKind::Style, "line_length") => {
            "Keep lines within the maximum length. Consider breaking long lines or using appropriate line continuation techniques."
        }
        (IssueKind::Style, "naming_convention") => {
            "Follow the project's naming convention for consistency."
        }
        (IssueKind::Architecture, "uncommon_import")
        | (IssueKind::Architecture, "uncommon_from_import")
        | (IssueKind::Architecture, "uncommon_js_import") => {
            "Consider if a standard library or commonly used import in the project would be more appropriate."
        }
        (IssueKind::Architecture, "error_handling") => {
            "Add appropriate error handling based on project patterns."
        }
        (IssueKind::Functionality, "logging") => {
            "Use the project's logging framework instead of print statements."
        }
        (IssueKind::Functionality, "testing") => {
            "Add appropriate test assertions following the project's testing patterns."
        }
        _ => "Review and adjust according to project standards.",
    };
    suggestion.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::detector::IssueReport;

    fn issue(kind: IssueKind, subtype: &str, message: &str, severity: Severity) -> Issue {
        Issue {
            kind,
            subtype: subtype.to_string(),
            message: message.to_string(),
            severity,
        }
    }

    fn analysis_with(issues: IssueReport) -> Analysis {
        Analysis {
            issues,
            similar_code: Vec::new(),
            diff: None,
        }
    }

    #[tokio::test]
    async fn test_ordering_is_stable_by_severity() {
        let issues = IssueReport {
            style: vec![
                issue(IssueKind::Style, "indentation", "first low", Severity::Low),
                issue(IssueKind::Style, "line_length", "second low", Severity::Low),
            ],
            architecture: vec![issue(
                IssueKind::Architecture,
                "error_handling",
                "a medium",
                Severity::Medium,
            )],
            functionality: vec![issue(
                IssueKind::Functionality,
                "testing",
                "a high",
                Severity::High,
            )],
        };

        let review = RecommendationSynthesizer::new()
            .synthesize(&analysis_with(issues), "app.py", None)
            .await;

        let severities: Vec<Severity> = review.recommendations.iter().map(|r| r.severity).collect();
        assert_eq!(
            severities,
            vec![Severity::High, Severity::Medium, Severity::Low, Severity::Low]
        );
        // ties preserve detection order
        assert_eq!(review.recommendations[2].message, "first low");
        assert_eq!(review.recommendations[3].message, "second low");
    }

    #[tokio::test]
    async fn test_critical_and_info_sort_after_named_buckets() {
        let issues = IssueReport {
            style: vec![
                issue(IssueKind::Style, "indentation", "critical", Severity::Critical),
                issue(IssueKind::Style, "indentation", "low", Severity::Low),
                issue(IssueKind::Style, "indentation", "info", Severity::Info),
                issue(IssueKind::Style, "indentation", "high", Severity::High),
            ],
            ..Default::default()
        };

        let review = RecommendationSynthesizer::new()
            .synthesize(&analysis_with(issues), "app.py", None)
            .await;

        let messages: Vec<&str> = review
            .recommendations
            .iter()
            .map(|r| r.message.as_str())
            .collect();
        assert_eq!(messages, vec!["high", "low", "critical", "info"]);
    }

    #[tokio::test]
    async fn test_suggestions_come_from_the_lookup_table() {
        let issues = IssueReport {
            functionality: vec![
                issue(IssueKind::Functionality, "logging", "m", Severity::Medium),
                issue(IssueKind::Functionality, "novel_subtype", "m", Severity::Low),
            ],
            ..Default::default()
        };

        let review = RecommendationSynthesizer::new()
            .synthesize(&analysis_with(issues), "app.py", None)
            .await;

        assert_eq!(
            review.recommendations[0].suggestion,
            "Use the project's logging framework instead of print statements."
        );
        assert_eq!(
            review.recommendations[1].suggestion,
            "Review and adjust according to project standards."
        );
    }

    #[tokio::test]
    async fn test_without_generator_no_explanation_appears() {
        let issues = IssueReport {
            style: vec![issue(IssueKind::Style, "indentation", "m", Severity::Low)],
            ..Default::default()
        };
        let mut analysis = analysis_with(issues);
        analysis.diff = Some("--- a/app.py\n+++ b/app.py\n".to_string());

        let review = RecommendationSynthesizer::new()
            .synthesize(&analysis, "app.py", None)
            .await;

        assert!(review.recommendations.iter().all(|r| r.explanation.is_none()));
        let json = serde_json::to_string(&review).unwrap();
        assert!(!json.contains("explanation"));
    }
}
