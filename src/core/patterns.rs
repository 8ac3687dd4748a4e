//! Typed records for the three learned pattern families.
//!
//! These are the persisted shape of a knowledge base's `patterns.json`.
//! Explicit structs (rather than free-form maps) so that a typo'd key is a
//! compile error, and unknown or missing keys on load degrade to a partial
//! document instead of a crash.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Import tally categories.
pub const IMPORT_DIRECT: &str = "direct";
pub const IMPORT_FROM: &str = "from";
pub const IMPORT_JS: &str = "js_imports";

/// Repository-preferred indentation, serialized as `"tabs"` or `"spaces:<n>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indentation {
    Tabs,
    Spaces(usize),
}

impl Indentation {
    /// Classify a run of leading whitespace: a tab anywhere makes it tabs,
    /// otherwise the run length in characters.
    pub fn classify(run: &str) -> Self {
        if run.contains('\t') {
            Indentation::Tabs
        } else {
            Indentation::Spaces(run.chars().count())
        }
    }
}

impl fmt::Display for Indentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Indentation::Tabs => write!(f, "tabs"),
            Indentation::Spaces(n) => write!(f, "spaces:{}", n),
        }
    }
}

impl FromStr for Indentation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s == "tabs" {
            return Ok(Indentation::Tabs);
        }
        if let Some(count) = s.strip_prefix("spaces:") {
            return count
                .parse::<usize>()
                .map(Indentation::Spaces)
                .map_err(|e| format!("invalid indentation '{}': {}", s, e));
        }
        Err(format!("invalid indentation '{}'", s))
    }
}

impl Serialize for Indentation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Indentation {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

static SNAKE_CASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").unwrap());
static CAMEL_CASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-zA-Z0-9]*$").unwrap());
static PASCAL_CASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][a-zA-Z0-9]*$").unwrap());
static UPPER_SNAKE_CASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").unwrap());
static KEBAB_CASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9-]*$").unwrap());

/// A naming convention, serialized under its conventional display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamingConvention {
    #[serde(rename = "snake_case")]
    Snake,
    #[serde(rename = "camelCase")]
    Camel,
    #[serde(rename = "PascalCase")]
    Pascal,
    #[serde(rename = "UPPER_SNAKE_CASE")]
    UpperSnake,
    #[serde(rename = "kebab-case")]
    Kebab,
    #[serde(rename = "unknown")]
    Unknown,
}

impl NamingConvention {
    /// The classification precedence is fixed: snake_case, then camelCase,
    /// PascalCase, UPPER_SNAKE_CASE, kebab-case. First match wins, so a name
    /// like `CONSTANT` classifies as PascalCase while `CON_STANT` reaches
    /// UPPER_SNAKE_CASE.
    pub fn classify(name: &str) -> NamingConvention {
        for convention in Self::PRECEDENCE {
            if convention.matches(name) {
                return convention;
            }
        }
        NamingConvention::Unknown
    }

    pub fn matches(self, name: &str) -> bool {
        match self {
            NamingConvention::Snake => SNAKE_CASE.is_match(name),
            NamingConvention::Camel => CAMEL_CASE.is_match(name),
            NamingConvention::Pascal => PASCAL_CASE.is_match(name),
            NamingConvention::UpperSnake => UPPER_SNAKE_CASE.is_match(name),
            NamingConvention::Kebab => KEBAB_CASE.is_match(name),
            NamingConvention::Unknown => false,
        }
    }

    const PRECEDENCE: [NamingConvention; 5] = [
        NamingConvention::Snake,
        NamingConvention::Camel,
        NamingConvention::Pascal,
        NamingConvention::UpperSnake,
        NamingConvention::Kebab,
    ];
}

impl fmt::Display for NamingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NamingConvention::Snake => "snake_case",
            NamingConvention::Camel => "camelCase",
            NamingConvention::Pascal => "PascalCase",
            NamingConvention::UpperSnake => "UPPER_SNAKE_CASE",
            NamingConvention::Kebab => "kebab-case",
            NamingConvention::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Constant-shaped names are tallied as constants before any variable
/// classification happens.
pub fn is_constant_shaped(name: &str) -> bool {
    UPPER_SNAKE_CASE.is_match(name)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineLengthStats {
    /// Arithmetic mean of observed line lengths
    pub average: u32,

    /// 95th percentile of observed line lengths
    pub preferred_max: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingPreferences {
    pub variables: Option<NamingConvention>,
    pub functions: Option<NamingConvention>,
    pub classes: Option<NamingConvention>,
    pub constants: Option<NamingConvention>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StylePatterns {
    pub indentation: Indentation,
    pub line_length: LineLengthStats,
    pub naming_conventions: NamingPreferences,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitecturePatterns {
    /// category -> top-10 most frequent import roots, most frequent first
    pub common_imports: BTreeMap<String, Vec<String>>,

    /// directory -> file basenames, only directories holding more than one file
    pub directory_structure: BTreeMap<String, Vec<String>>,

    /// error-handling construct -> occurrence count
    pub error_handling: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionalPatterns {
    /// function name -> definition count, top 20
    pub common_functions: BTreeMap<String, u64>,

    /// parameter name -> occurrence count across all functions, top 20
    pub common_args: BTreeMap<String, u64>,

    /// `<receiver>.<level>` (or the reserved `print` key) -> call count
    pub logging_patterns: BTreeMap<String, u64>,

    /// assertion method -> call count within test-signaling functions
    pub test_patterns: BTreeMap<String, u64>,
}

/// All three pattern families for one repository snapshot. Families missing
/// from a persisted document load as `None` and their checks are skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodebasePatterns {
    #[serde(default)]
    pub style: Option<StylePatterns>,

    #[serde(default)]
    pub architecture: Option<ArchitecturePatterns>,

    #[serde(default)]
    pub functional: Option<FunctionalPatterns>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indentation_round_trip() {
        assert_eq!(Indentation::Tabs.to_string(), "tabs");
        assert_eq!(Indentation::Spaces(4).to_string(), "spaces:4");
        assert_eq!("tabs".parse::<Indentation>().unwrap(), Indentation::Tabs);
        assert_eq!("spaces:2".parse::<Indentation>().unwrap(), Indentation::Spaces(2));
        assert!("spaces:x".parse::<Indentation>().is_err());
    }

    #[test]
    fn test_classify_precedence() {
        assert_eq!(NamingConvention::classify("my_var"), NamingConvention::Snake);
        assert_eq!(NamingConvention::classify("myVar"), NamingConvention::Camel);
        assert_eq!(NamingConvention::classify("MyType"), NamingConvention::Pascal);
        assert_eq!(NamingConvention::classify("MY_CONST"), NamingConvention::UpperSnake);
        assert_eq!(NamingConvention::classify("my-thing"), NamingConvention::Kebab);
        assert_eq!(NamingConvention::classify("_private"), NamingConvention::Unknown);
    }

    // Known boundary: an all-caps name with no separator matches PascalCase
    // before UPPER_SNAKE_CASE in the fixed precedence.
    #[test]
    fn test_constant_shaped_without_underscore_classifies_as_pascal() {
        assert!(is_constant_shaped("CONSTANT"));
        assert_eq!(NamingConvention::classify("CONSTANT"), NamingConvention::Pascal);
        assert_eq!(NamingConvention::classify("CON_STANT"), NamingConvention::UpperSnake);
    }

    #[test]
    fn test_partial_patterns_document_loads() {
        let doc = r#"{ "style": null }"#;
        let patterns: CodebasePatterns = serde_json::from_str(doc).unwrap();
        assert!(patterns.style.is_none());
        assert!(patterns.architecture.is_none());
        assert!(patterns.functional.is_none());
    }
}
