//! Derives the three pattern families from an indexed file set.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::error::Result;
use super::indexer::FileRecord;
use super::languages::{AnalyzerSet, ASSERTION_METHODS, LOG_LEVEL_METHODS};
use super::patterns::{
    is_constant_shaped, ArchitecturePatterns, CodebasePatterns, FunctionalPatterns, Indentation,
    LineLengthStats, NamingConvention, NamingPreferences, StylePatterns, IMPORT_DIRECT,
    IMPORT_FROM, IMPORT_JS,
};

/// First run of leading whitespace on any line of the file.
static FIRST_INDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(\s+)").unwrap());

const DEFAULT_AVERAGE_LINE_LENGTH: u32 = 80;
const DEFAULT_MAX_LINE_LENGTH: u32 = 100;
const TOP_IMPORTS: usize = 10;
const TOP_FUNCTIONS: usize = 20;
const TOP_ARGS: usize = 20;

/// Frequency tally that remembers first-seen order, so that ties resolve
/// deterministically no matter how counts accumulate.
#[derive(Debug, Clone)]
struct Tally<T: Clone + Eq + Hash> {
    counts: HashMap<T, u64>,
    order: Vec<T>,
}

impl<T: Clone + Eq + Hash> Tally<T> {
    fn new() -> Self {
        Self {
            counts: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn bump(&mut self, key: T) {
        self.add(key, 1);
    }

    fn add(&mut self, key: T, n: u64) {
        if n == 0 {
            return;
        }
        if !self.counts.contains_key(&key) {
            self.order.push(key.clone());
        }
        *self.counts.entry(key).or_insert(0) += n;
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Most frequent key; ties break by first-seen order.
    fn mode(&self) -> Option<&T> {
        let mut best: Option<(&T, u64)> = None;
        for key in &self.order {
            let count = self.counts[key];
            if best.map(|(_, c)| count > c).unwrap_or(true) {
                best = Some((key, count));
            }
        }
        best.map(|(key, _)| key)
    }

    /// Keys ordered by descending count, first-seen order within equal counts.
    fn most_common(&self, n: usize) -> Vec<(T, u64)> {
        let mut entries: Vec<(T, u64)> = self
            .order
            .iter()
            .map(|key| (key.clone(), self.counts[key]))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries.truncate(n);
        entries
    }

    fn into_map(self) -> BTreeMap<T, u64>
    where
        T: Ord,
    {
        self.counts.into_iter().collect()
    }
}

/// 95th percentile with linear interpolation, rounded to nearest integer.
fn percentile_95(values: &[usize]) -> u32 {
    let mut sorted: Vec<usize> = values.to_vec();
    sorted.sort_unstable();

    let rank = (sorted.len() - 1) as f64 * 0.95;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    let value = sorted[lower] as f64 + (sorted[upper] as f64 - sorted[lower] as f64) * fraction;
    value.round() as u32
}

/// Extracts coding patterns and conventions from an indexed file set.
pub struct PatternExtractor {
    analyzers: AnalyzerSet,
}

impl PatternExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            analyzers: AnalyzerSet::new()?,
        })
    }

    /// Extract all three pattern families.
    pub fn extract(&mut self, files: &[FileRecord]) -> CodebasePatterns {
        CodebasePatterns {
            style: Some(self.extract_style(files)),
            architecture: Some(self.extract_architecture(files)),
            functional: Some(self.extract_functional(files)),
        }
    }

    fn extract_style(&mut self, files: &[FileRecord]) -> StylePatterns {
        info!("Extracting style patterns from the codebase");

        let mut indentation: Tally<Indentation> = Tally::new();
        let mut line_lengths: Vec<usize> = Vec::new();
        let mut variables: Tally<NamingConvention> = Tally::new();
        let mut functions: Tally<NamingConvention> = Tally::new();
        let mut classes: Tally<NamingConvention> = Tally::new();
        let mut constants: Tally<NamingConvention> = Tally::new();

        for file in files {
            if let Some(run) = FIRST_INDENT.find(&file.content) {
                indentation.bump(Indentation::classify(run.as_str()));
            }

            for line in file.content.lines() {
                let trimmed = line.trim();
                if !trimmed.is_empty() && !trimmed.starts_with('#') && !trimmed.starts_with("//") {
                    line_lengths.push(line.chars().count());
                }
            }

            if file.extension != ".py" {
                continue;
            }
            let outline = match self.analyzers.outline(&file.content, ".py") {
                Some(Ok(outline)) => outline,
                Some(Err(e)) => {
                    debug!("Failed to parse {}: {}", file.relative_path, e);
                    continue;
                }
                None => continue,
            };

            for name in &outline.variables {
                let target = if is_constant_shaped(name) {
                    &mut constants
                } else {
                    &mut variables
                };
                let convention = NamingConvention::classify(name);
                if convention != NamingConvention::Unknown {
                    target.bump(convention);
                }
            }
            for function in &outline.functions {
                let convention = NamingConvention::classify(&function.name);
                if convention != NamingConvention::Unknown {
                    functions.bump(convention);
                }
            }
            for class in &outline.classes {
                let convention = NamingConvention::classify(class);
                if convention != NamingConvention::Unknown {
                    classes.bump(convention);
                }
            }
        }

        let line_length = if line_lengths.is_empty() {
            LineLengthStats {
                average: DEFAULT_AVERAGE_LINE_LENGTH,
                preferred_max: DEFAULT_MAX_LINE_LENGTH,
            }
        } else {
            let sum: usize = line_lengths.iter().sum();
            LineLengthStats {
                average: (sum as f64 / line_lengths.len() as f64).round() as u32,
                preferred_max: percentile_95(&line_lengths),
            }
        };

        StylePatterns {
            indentation: indentation.mode().copied().unwrap_or(Indentation::Spaces(4)),
            line_length,
            naming_conventions: NamingPreferences {
                variables: variables.mode().copied(),
                functions: functions.mode().copied(),
                classes: classes.mode().copied(),
                constants: constants.mode().copied(),
            },
        }
    }

    fn extract_architecture(&mut self, files: &[FileRecord]) -> ArchitecturePatterns {
        info!("Extracting architectural patterns from the codebase");

        let mut direct: Tally<String> = Tally::new();
        let mut from: Tally<String> = Tally::new();
        let mut js: Tally<String> = Tally::new();
        let mut error_handling: Tally<String> = Tally::new();
        let mut file_structure: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for file in files {
            let path = Path::new(&file.relative_path);
            let parent = path
                .parent()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            let basename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.relative_path.clone());
            file_structure.entry(parent).or_default().push(basename);

            let outline = match self.analyzers.outline(&file.content, &file.extension) {
                Some(Ok(outline)) => outline,
                Some(Err(e)) => {
                    debug!("Failed to parse {}: {}", file.relative_path, e);
                    continue;
                }
                None => continue,
            };

            for import in &outline.direct_imports {
                direct.bump(python_import_root(import).to_string());
            }
            for import in &outline.from_imports {
                from.bump(python_import_root(import).to_string());
            }
            for import in &outline.text_imports {
                js.bump(js_import_root(import).to_string());
            }

            match file.extension.as_str() {
                ".py" => error_handling.add("try_except".to_string(), outline.try_count as u64),
                ".js" | ".ts" => {
                    error_handling.add("try_catch".to_string(), outline.try_count as u64)
                }
                _ => {}
            }
            for exception in &outline.except_types {
                error_handling.bump(format!("except_{}", exception));
            }
        }

        let mut common_imports = BTreeMap::new();
        for (category, tally) in [(IMPORT_DIRECT, &direct), (IMPORT_FROM, &from), (IMPORT_JS, &js)]
        {
            if !tally.is_empty() {
                common_imports.insert(
                    category.to_string(),
                    tally
                        .most_common(TOP_IMPORTS)
                        .into_iter()
                        .map(|(root, _)| root)
                        .collect(),
                );
            }
        }

        // Only directories grouping more than one file carry signal
        let directory_structure = file_structure
            .into_iter()
            .filter(|(_, names)| names.len() > 1)
            .collect();

        ArchitecturePatterns {
            common_imports,
            directory_structure,
            error_handling: error_handling.into_map(),
        }
    }

    fn extract_functional(&mut self, files: &[FileRecord]) -> FunctionalPatterns {
        info!("Extracting functional patterns from the codebase");

        let mut common_functions: Tally<String> = Tally::new();
        let mut common_args: Tally<String> = Tally::new();
        let mut logging: Tally<String> = Tally::new();
        let mut tests: Tally<String> = Tally::new();

        for file in files {
            if file.extension != ".py" {
                continue;
            }
            let outline = match self.analyzers.outline(&file.content, ".py") {
                Some(Ok(outline)) => outline,
                Some(Err(e)) => {
                    debug!("Failed to parse {}: {}", file.relative_path, e);
                    continue;
                }
                None => continue,
            };

            let path_signals_test = file.relative_path.to_lowercase().contains("test");
            for function in &outline.functions {
                common_functions.bump(function.name.clone());
                for param in &function.params {
                    common_args.bump(param.clone());
                }

                for call in &function.calls {
                    if call.is_method && LOG_LEVEL_METHODS.contains(&call.method.as_str()) {
                        if let Some(receiver) = &call.receiver {
                            logging.bump(format!("{}.{}", receiver, call.method));
                        }
                    } else if !call.is_method && call.method == "print" {
                        logging.bump("print".to_string());
                    }
                }

                if path_signals_test || function.name.starts_with("test_") {
                    for call in &function.calls {
                        if call.is_method && ASSERTION_METHODS.contains(&call.method.as_str()) {
                            tests.bump(call.method.clone());
                        }
                    }
                }
            }
        }

        FunctionalPatterns {
            common_functions: common_functions
                .most_common(TOP_FUNCTIONS)
                .into_iter()
                .collect(),
            common_args: common_args.most_common(TOP_ARGS).into_iter().collect(),
            logging_patterns: logging.into_map(),
            test_patterns: tests.into_map(),
        }
    }
}

/// Root component of a dotted Python module path.
pub fn python_import_root(import: &str) -> &str {
    import.split('.').next().unwrap_or(import)
}

/// Root component of an ES-module specifier: the first path segment, so
/// relative imports share the `.` / `..` roots.
pub fn js_import_root(specifier: &str) -> &str {
    specifier.split('/').next().unwrap_or(specifier)
}
