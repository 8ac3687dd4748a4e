//! Rule-based comparison of a candidate file against the learned patterns.
//!
//! Detection is a pure function of (candidate, extension, stored patterns):
//! no state survives between calls, and every check skips itself when the
//! pattern data it needs is missing.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use super::extractor::{js_import_root, python_import_root};
use super::indexer::file_extension;
use super::knowledge::{KnowledgeStore, SimilarCode};
use super::languages::{AnalyzerSet, SourceOutline, ASSERTION_METHODS, LOG_LEVEL_METHODS};
use super::patterns::{
    CodebasePatterns, Indentation, NamingConvention, IMPORT_DIRECT, IMPORT_FROM, IMPORT_JS,
};

static FIRST_INDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(\s+)").unwrap());

/// Similar chunks retrieved as synthesis context per analysis.
pub const SIMILAR_CONTEXT_K: usize = 5;

/// Functions with more statements than this want error handling.
const NON_TRIVIAL_BODY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Style,
    Architecture,
    Functionality,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueKind::Style => "style",
            IssueKind::Architecture => "architecture",
            IssueKind::Functionality => "functionality",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Ranking used for recommendation ordering: high, then medium, then
    /// low. Critical and info sort after the three named buckets; that
    /// placement is part of the output contract.
    pub fn rank(self) -> u8 {
        match self {
            Severity::High => 0,
            Severity::Medium => 1,
            Severity::Low => 2,
            _ => 3,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        };
        write!(f, "{}", name)
    }
}

/// A deterministic finding. Produced fresh per analysis call, never
/// persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub subtype: String,
    pub message: String,
    pub severity: Severity,
}

impl Issue {
    fn new(kind: IssueKind, subtype: &str, message: String, severity: Severity) -> Self {
        Self {
            kind,
            subtype: subtype.to_string(),
            message,
            severity,
        }
    }
}

/// Issues grouped by detector pass, in detection order.
#[derive(Debug, Default)]
pub struct IssueReport {
    pub style: Vec<Issue>,
    pub architecture: Vec<Issue>,
    pub functionality: Vec<Issue>,
}

impl IssueReport {
    /// All issues in detection order: style, then architecture, then
    /// functionality.
    pub fn iter(&self) -> impl Iterator<Item = &Issue> {
        self.style
            .iter()
            .chain(self.architecture.iter())
            .chain(self.functionality.iter())
    }
}

/// Everything the synthesizer needs about one candidate.
#[derive(Debug, Default)]
pub struct Analysis {
    pub issues: IssueReport,
    pub similar_code: Vec<SimilarCode>,
    pub diff: Option<String>,
}

/// Compares candidate code against stored patterns.
pub struct IssueDetector {
    analyzers: AnalyzerSet,
}

impl IssueDetector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            analyzers: AnalyzerSet::new()?,
        })
    }

    /// Run the three detector passes and gather retrieval context. Retrieval
    /// failure degrades to an empty context, never aborts detection.
    pub async fn analyze(
        &mut self,
        code: &str,
        file_path: &str,
        patterns: &CodebasePatterns,
        store: &KnowledgeStore,
    ) -> Analysis {
        info!("Analyzing code for {}", file_path);

        let issues = IssueReport {
            style: self.analyze_style(code, file_path, patterns),
            architecture: self.analyze_architecture(code, file_path, patterns),
            functionality: self.analyze_functionality(code, file_path, patterns),
        };

        let similar_code = match store.retrieve_similar(code, SIMILAR_CONTEXT_K).await {
            Ok(similar) => similar,
            Err(e) => {
                warn!("Similar-code retrieval failed: {}", e);
                Vec::new()
            }
        };

        Analysis {
            issues,
            similar_code,
            diff: None,
        }
    }

    fn analyze_style(&mut self, code: &str, file_path: &str, patterns: &CodebasePatterns) -> Vec<Issue> {
        let Some(style) = &patterns.style else {
            debug!("Style patterns not available; skipping style checks");
            return Vec::new();
        };

        let mut issues = Vec::new();

        // Indentation
        if let Some(run) = FIRST_INDENT.find(code) {
            let current = Indentation::classify(run.as_str());
            if current != style.indentation {
                issues.push(Issue::new(
                    IssueKind::Style,
                    "indentation",
                    format!(
                        "Indentation uses {}, but project standard is {}",
                        current, style.indentation
                    ),
                    Severity::Low,
                ));
            }
        }

        // Line length
        let max_length = style.line_length.preferred_max as usize;
        let long_lines: Vec<usize> = code
            .lines()
            .enumerate()
            .filter(|(_, line)| line.trim_end().chars().count() > max_length)
            .map(|(i, _)| i + 1)
            .collect();

        if !long_lines.is_empty() {
            let line_list = if long_lines.len() <= 3 {
                long_lines
                    .iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            } else {
                format!(
                    "{}, {}, ... and {} more",
                    long_lines[0],
                    long_lines[1],
                    long_lines.len() - 2
                )
            };
            issues.push(Issue::new(
                IssueKind::Style,
                "line_length",
                format!(
                    "Lines exceed maximum length of {} characters: {}",
                    max_length, line_list
                ),
                Severity::Low,
            ));
        }

        // Naming conventions need a syntax tree
        if file_extension(file_path) == ".py" {
            if let Some(outline) = self.outline(code, ".py", file_path) {
                let naming = &style.naming_conventions;
                for name in &outline.variables {
                    issues.extend(check_naming(name, naming.variables, "Variable"));
                }
                for function in &outline.functions {
                    issues.extend(check_naming(&function.name, naming.functions, "Function"));
                }
                for class in &outline.classes {
                    issues.extend(check_naming(class, naming.classes, "Class"));
                }
            }
        }

        issues
    }

    fn analyze_architecture(
        &mut self,
        code: &str,
        file_path: &str,
        patterns: &CodebasePatterns,
    ) -> Vec<Issue> {
        let Some(architecture) = &patterns.architecture else {
            debug!("Architecture patterns not available; skipping architecture checks");
            return Vec::new();
        };

        let mut issues = Vec::new();
        let extension = file_extension(file_path);

        match extension.as_str() {
            ".py" => {
                let Some(outline) = self.outline(code, ".py", file_path) else {
                    return issues;
                };

                if let Some(common) = architecture.common_imports.get(IMPORT_DIRECT) {
                    let uncommon: Vec<&str> = outline
                        .direct_imports
                        .iter()
                        .filter(|import| !common.iter().any(|c| c == python_import_root(import)))
                        .map(|import| import.as_str())
                        .collect();
                    if !uncommon.is_empty() {
                        issues.push(Issue::new(
                            IssueKind::Architecture,
                            "uncommon_import",
                            format!("Uncommon imports detected: {}", uncommon.join(", ")),
                            Severity::Medium,
                        ));
                    }
                }

                if let Some(common) = architecture.common_imports.get(IMPORT_FROM) {
                    let uncommon: Vec<&str> = outline
                        .from_imports
                        .iter()
                        .filter(|import| !common.iter().any(|c| c == python_import_root(import)))
                        .map(|import| import.as_str())
                        .collect();
                    if !uncommon.is_empty() {
                        issues.push(Issue::new(
                            IssueKind::Architecture,
                            "uncommon_from_import",
                            format!("Uncommon from imports detected: {}", uncommon.join(", ")),
                            Severity::Low,
                        ));
                    }
                }

                // One issue per file: a non-trivial function somewhere with
                // no handler anywhere
                let non_trivial = outline
                    .functions
                    .iter()
                    .any(|f| f.body_statements > NON_TRIVIAL_BODY);
                if outline.try_count == 0 && non_trivial {
                    issues.push(Issue::new(
                        IssueKind::Architecture,
                        "error_handling",
                        "Function lacks error handling. Consider adding try/except blocks based on project patterns."
                            .to_string(),
                        Severity::Medium,
                    ));
                }
            }
            ".js" | ".ts" => {
                let Some(outline) = self.outline(code, &extension, file_path) else {
                    return issues;
                };

                if let Some(common) = architecture.common_imports.get(IMPORT_JS) {
                    let uncommon: Vec<&str> = outline
                        .text_imports
                        .iter()
                        .filter(|import| !common.iter().any(|c| c == js_import_root(import)))
                        .map(|import| import.as_str())
                        .collect();
                    if !uncommon.is_empty() {
                        issues.push(Issue::new(
                            IssueKind::Architecture,
                            "uncommon_js_import",
                            format!("Uncommon imports detected: {}", uncommon.join(", ")),
                            Severity::Low,
                        ));
                    }
                }
            }
            _ => {}
        }

        issues
    }

    fn analyze_functionality(
        &mut self,
        code: &str,
        file_path: &str,
        patterns: &CodebasePatterns,
    ) -> Vec<Issue> {
        let Some(functional) = &patterns.functional else {
            debug!("Functional patterns not available; skipping functionality checks");
            return Vec::new();
        };

        if file_extension(file_path) != ".py" {
            return Vec::new();
        }
        let Some(outline) = self.outline(code, ".py", file_path) else {
            return Vec::new();
        };

        let mut issues = Vec::new();

        let has_logging = outline
            .calls
            .iter()
            .any(|call| call.is_method && LOG_LEVEL_METHODS.contains(&call.method.as_str()));
        let has_print = outline
            .calls
            .iter()
            .any(|call| !call.is_method && call.method == "print");

        // Print output is only an issue when the learned corpus logs through
        // a framework and print is not itself a learned pattern
        if has_print
            && !has_logging
            && !functional.logging_patterns.is_empty()
            && !functional.logging_patterns.contains_key("print")
        {
            issues.push(Issue::new(
                IssueKind::Functionality,
                "logging",
                "Using print() for output, but project uses a logging framework. Consider using the appropriate logging methods."
                    .to_string(),
                Severity::Medium,
            ));
        }

        if file_path.to_lowercase().contains("test") {
            let has_assertions = outline
                .calls
                .iter()
                .any(|call| call.is_method && ASSERTION_METHODS.contains(&call.method.as_str()));
            if !has_assertions {
                issues.push(Issue::new(
                    IssueKind::Functionality,
                    "testing",
                    "Test file lacks assertions. Consider adding appropriate test assertions."
                        .to_string(),
                    Severity::High,
                ));
            }
        }

        issues
    }

    fn outline(&mut self, code: &str, extension: &str, file_path: &str) -> Option<SourceOutline> {
        match self.analyzers.outline(code, extension) {
            Some(Ok(outline)) => Some(outline),
            Some(Err(e)) => {
                debug!("Failed to parse {}: {}", file_path, e);
                None
            }
            None => None,
        }
    }
}

fn check_naming(
    name: &str,
    preferred: Option<NamingConvention>,
    entity: &str,
) -> Option<Issue> {
    let preferred = preferred.filter(|p| *p != NamingConvention::Unknown)?;

    if preferred.matches(name) {
        return None;
    }
    let current = NamingConvention::classify(name);
    Some(Issue::new(
        IssueKind::Style,
        "naming_convention",
        format!(
            "{} name '{}' uses {} convention, but project standard is {}",
            entity, name, current, preferred
        ),
        Severity::Low,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, StorageConfig};
    use crate::core::patterns::{
        ArchitecturePatterns, FunctionalPatterns, LineLengthStats, NamingPreferences,
        StylePatterns,
    };
    use std::collections::BTreeMap;

    fn store() -> KnowledgeStore {
        let config = Config::default();
        KnowledgeStore::new(
            &StorageConfig {
                root: std::env::temp_dir().join("reviewcraft-detector-tests"),
            },
            &config.chunking,
            None,
        )
    }

    fn learned_patterns() -> CodebasePatterns {
        let mut common_imports = BTreeMap::new();
        common_imports.insert("direct".to_string(), vec!["os".to_string(), "json".to_string()]);
        common_imports.insert("from".to_string(), vec!["collections".to_string()]);

        let mut logging_patterns = BTreeMap::new();
        logging_patterns.insert("logger.info".to_string(), 12u64);

        CodebasePatterns {
            style: Some(StylePatterns {
                indentation: Indentation::Spaces(4),
                line_length: LineLengthStats {
                    average: 60,
                    preferred_max: 100,
                },
                naming_conventions: NamingPreferences {
                    variables: Some(NamingConvention::Snake),
                    functions: Some(NamingConvention::Snake),
                    classes: Some(NamingConvention::Pascal),
                    constants: Some(NamingConvention::UpperSnake),
                },
            }),
            architecture: Some(ArchitecturePatterns {
                common_imports,
                directory_structure: BTreeMap::new(),
                error_handling: BTreeMap::new(),
            }),
            functional: Some(FunctionalPatterns {
                common_functions: BTreeMap::new(),
                common_args: BTreeMap::new(),
                logging_patterns,
                test_patterns: BTreeMap::new(),
            }),
        }
    }

    async fn analyze(code: &str, path: &str) -> Analysis {
        let mut detector = IssueDetector::new().unwrap();
        detector.analyze(code, path, &learned_patterns(), &store()).await
    }

    #[tokio::test]
    async fn test_single_long_line_yields_one_issue_with_its_number() {
        let code = format!("short = 1\nvalue = \"{}\"\n", "x".repeat(120));
        let analysis = analyze(&code, "app.py").await;

        let line_issues: Vec<_> = analysis
            .issues
            .style
            .iter()
            .filter(|i| i.subtype == "line_length")
            .collect();
        assert_eq!(line_issues.len(), 1);
        assert!(line_issues[0].message.contains(": 2"));
        assert_eq!(line_issues[0].severity, Severity::Low);
    }

    #[tokio::test]
    async fn test_many_long_lines_are_summarized() {
        let long = format!("value = \"{}\"\n", "x".repeat(120));
        let analysis = analyze(&long.repeat(5), "app.py").await;

        let issue = analysis
            .issues
            .style
            .iter()
            .find(|i| i.subtype == "line_length")
            .unwrap();
        assert!(issue.message.contains("1, 2, ... and 3 more"));
    }

    #[tokio::test]
    async fn test_indentation_mismatch() {
        let code = "def f():\n\treturn 1\n";
        let analysis = analyze(code, "app.py").await;
        let issue = analysis
            .issues
            .style
            .iter()
            .find(|i| i.subtype == "indentation")
            .unwrap();
        assert!(issue.message.contains("tabs"));
        assert!(issue.message.contains("spaces:4"));
    }

    #[tokio::test]
    async fn test_naming_mismatch_names_both_conventions() {
        let code = "def BadName():\n    pass\n";
        let analysis = analyze(code, "app.py").await;
        let issue = analysis
            .issues
            .style
            .iter()
            .find(|i| i.subtype == "naming_convention")
            .unwrap();
        assert!(issue.message.contains("'BadName'"));
        assert!(issue.message.contains("PascalCase"));
        assert!(issue.message.contains("snake_case"));
    }

    #[tokio::test]
    async fn test_uncommon_imports_severities() {
        let code = "import os\nimport obscure_pkg\nfrom weird_pkg import thing\n";
        let analysis = analyze(code, "app.py").await;

        let direct = analysis
            .issues
            .architecture
            .iter()
            .find(|i| i.subtype == "uncommon_import")
            .unwrap();
        assert_eq!(direct.severity, Severity::Medium);
        assert!(direct.message.contains("obscure_pkg"));
        assert!(!direct.message.contains("os"));

        let from = analysis
            .issues
            .architecture
            .iter()
            .find(|i| i.subtype == "uncommon_from_import")
            .unwrap();
        assert_eq!(from.severity, Severity::Low);
        assert!(from.message.contains("weird_pkg"));
    }

    #[tokio::test]
    async fn test_missing_error_handling_is_one_issue_per_file() {
        let code = r#"
def busy_function():
    a = 1
    b = 2
    c = 3
    d = 4
    e = 5
    return a + b + c + d + e

def another_busy_function():
    a = 1
    b = 2
    c = 3
    d = 4
    e = 5
    return e
"#;
        let analysis = analyze(code, "app.py").await;
        let handling: Vec<_> = analysis
            .issues
            .architecture
            .iter()
            .filter(|i| i.subtype == "error_handling")
            .collect();
        assert_eq!(handling.len(), 1);
        assert_eq!(handling[0].severity, Severity::Medium);
    }

    #[tokio::test]
    async fn test_trivial_functions_do_not_want_error_handling() {
        let code = "def tiny():\n    return 1\n";
        let analysis = analyze(code, "app.py").await;
        assert!(analysis
            .issues
            .architecture
            .iter()
            .all(|i| i.subtype != "error_handling"));
    }

    #[tokio::test]
    async fn test_print_without_logging_is_flagged() {
        let code = "def run():\n    print(\"hi\")\n";
        let analysis = analyze(code, "app.py").await;
        let issue = analysis
            .issues
            .functionality
            .iter()
            .find(|i| i.subtype == "logging")
            .unwrap();
        assert_eq!(issue.severity, Severity::Medium);
    }

    #[tokio::test]
    async fn test_print_alongside_logging_is_fine() {
        let code = "def run():\n    logger.info(\"hi\")\n    print(\"hi\")\n";
        let analysis = analyze(code, "app.py").await;
        assert!(analysis
            .issues
            .functionality
            .iter()
            .all(|i| i.subtype != "logging"));
    }

    #[tokio::test]
    async fn test_test_file_without_assertions_is_one_high_issue() {
        let code = r#"
def test_one():
    run()

def test_two():
    run_again()
"#;
        let analysis = analyze(code, "tests/test_app.py").await;
        let testing: Vec<_> = analysis
            .issues
            .functionality
            .iter()
            .filter(|i| i.subtype == "testing")
            .collect();
        assert_eq!(testing.len(), 1);
        assert_eq!(testing[0].severity, Severity::High);
    }

    #[tokio::test]
    async fn test_detection_is_idempotent() {
        let code = format!(
            "import obscure_pkg\n\ndef BadName():\n\tprint(\"{}\")\n",
            "x".repeat(150)
        );
        let first = analyze(&code, "app.py").await;
        let second = analyze(&code, "app.py").await;

        let render = |a: &Analysis| {
            a.issues
                .iter()
                .map(|i| format!("{}/{}/{}/{}", i.kind, i.subtype, i.severity, i.message))
                .collect::<Vec<_>>()
        };
        assert_eq!(render(&first), render(&second));
        assert!(!render(&first).is_empty());
    }

    #[tokio::test]
    async fn test_missing_pattern_families_skip_checks() {
        let mut detector = IssueDetector::new().unwrap();
        let empty = CodebasePatterns::default();
        let analysis = detector
            .analyze("def f():\n\tprint(1)\n", "test_app.py", &empty, &store())
            .await;
        assert_eq!(analysis.issues.iter().count(), 0);
    }
}
