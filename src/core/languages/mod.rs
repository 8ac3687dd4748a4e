//! Language-specific source analyzers.
//!
//! Each analyzer reduces a source file to the structural outline the pattern
//! extractor and issue detector work from: names, imports, functions, call
//! sites and error-handling constructs. Python gets a real syntax tree via
//! Tree-sitter; JavaScript/TypeScript are mined with text patterns.

mod python;
mod javascript;

pub use python::PythonAnalyzer;
pub use javascript::JavaScriptAnalyzer;

use crate::error::Result;

/// Method names treated as log-level calls when invoked on some receiver.
pub const LOG_LEVEL_METHODS: [&str; 5] = ["debug", "info", "warning", "error", "critical"];

/// Assertion methods recognized inside test-signaling functions.
pub const ASSERTION_METHODS: [&str; 4] =
    ["assertEqual", "assertTrue", "assertFalse", "assertRaises"];

/// A call expression observed somewhere in a file.
#[derive(Debug, Clone)]
pub struct CallSite {
    /// Receiver identifier for simple `obj.method(...)` calls
    pub receiver: Option<String>,

    /// Called method or function name
    pub method: String,

    /// Whether the call goes through an attribute (`x.y()`) rather than a
    /// bare name (`y()`)
    pub is_method: bool,
}

/// A function definition with the details pattern mining needs.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub name: String,

    /// Positional parameter names, `self` included
    pub params: Vec<String>,

    /// Number of statements directly in the function body
    pub body_statements: usize,

    /// Every call site in the function's subtree, nested functions included
    pub calls: Vec<CallSite>,
}

/// Structural outline of one source file.
#[derive(Debug, Clone, Default)]
pub struct SourceOutline {
    /// Plain assignment-target identifiers, in source order
    pub variables: Vec<String>,

    pub functions: Vec<FunctionInfo>,

    pub classes: Vec<String>,

    /// `import x.y` targets, full dotted path
    pub direct_imports: Vec<String>,

    /// `from x.y import z` modules, full dotted path
    pub from_imports: Vec<String>,

    /// ES-module import specifiers mined by text pattern
    pub text_imports: Vec<String>,

    /// Number of structured exception-handling blocks
    pub try_count: usize,

    /// Handled exception type names, one entry per handler
    pub except_types: Vec<String>,

    /// Every call site in the file
    pub calls: Vec<CallSite>,
}

/// Trait that all language analyzers must implement
pub trait LanguageAnalyzer {
    /// Reduce source code to its structural outline
    fn analyze(&mut self, content: &str) -> Result<SourceOutline>;

    /// Get the file extensions this analyzer handles (lowercase, with dot)
    fn file_extensions(&self) -> &[&str];

    /// Get the language name
    fn language_name(&self) -> &str;
}

/// The registered analyzers, dispatched by file extension.
pub struct AnalyzerSet {
    analyzers: Vec<Box<dyn LanguageAnalyzer>>,
}

impl AnalyzerSet {
    pub fn new() -> Result<Self> {
        Ok(Self {
            analyzers: vec![
                Box::new(PythonAnalyzer::new()?),
                Box::new(JavaScriptAnalyzer::new()),
            ],
        })
    }

    /// Outline `content` using the analyzer registered for `extension`.
    /// Returns `None` when no analyzer handles the extension.
    pub fn outline(&mut self, content: &str, extension: &str) -> Option<Result<SourceOutline>> {
        let analyzer = self
            .analyzers
            .iter_mut()
            .find(|a| a.file_extensions().contains(&extension))?;
        Some(analyzer.analyze(content))
    }
}
