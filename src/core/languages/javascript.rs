use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;
use super::{LanguageAnalyzer, SourceOutline};

static ES_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s+(?:\{[^}]+\}|[^{]+)\s+from\s+['"]([^'"]+)['"]"#).unwrap()
});
static TRY_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"try\s*\{").unwrap());

/// JavaScript/TypeScript analyzer working on text patterns; no syntax tree,
/// so only imports and try-blocks are mined.
pub struct JavaScriptAnalyzer;

impl JavaScriptAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JavaScriptAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for JavaScriptAnalyzer {
    fn analyze(&mut self, content: &str) -> Result<SourceOutline> {
        let mut outline = SourceOutline::default();

        for capture in ES_IMPORT.captures_iter(content) {
            outline.text_imports.push(capture[1].to_string());
        }
        outline.try_count = TRY_OPEN.find_iter(content).count();

        Ok(outline)
    }

    fn file_extensions(&self) -> &[&str] {
        &[".js", ".ts"]
    }

    fn language_name(&self) -> &str {
        "javascript"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_mining() {
        let code = r#"
import React from 'react';
import { useState } from 'react';
import helper from './utils/helper';

try {
  run();
} catch (e) {}
"#;
        let mut analyzer = JavaScriptAnalyzer::new();
        let outline = analyzer.analyze(code).unwrap();
        assert_eq!(outline.text_imports, vec!["react", "react", "./utils/helper"]);
        assert_eq!(outline.try_count, 1);
    }
}
