use tree_sitter::{Node, Parser};

use crate::error::{ReviewError, Result};
use super::{CallSite, FunctionInfo, LanguageAnalyzer, SourceOutline};

/// Python analyzer using Tree-sitter
pub struct PythonAnalyzer {
    parser: Parser,
}

impl PythonAnalyzer {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let python_language = tree_sitter_python::language();
        parser
            .set_language(&python_language)
            .map_err(|e| ReviewError::Parser(format!("Failed to set Python language: {}", e)))?;

        Ok(Self { parser })
    }
}

impl LanguageAnalyzer for PythonAnalyzer {
    fn analyze(&mut self, content: &str) -> Result<SourceOutline> {
        let tree = self
            .parser
            .parse(content, None)
            .ok_or_else(|| ReviewError::Parser("Failed to parse Python code".to_string()))?;

        let mut outline = SourceOutline::default();
        walk(tree.root_node(), content, &mut outline);
        Ok(outline)
    }

    fn file_extensions(&self) -> &[&str] {
        &[".py"]
    }

    fn language_name(&self) -> &str {
        "python"
    }
}

/// Visit the whole tree, mirroring a full AST walk: nested definitions and
/// calls are recorded at every level they appear.
fn walk(node: Node, source: &str, outline: &mut SourceOutline) {
    match node.kind() {
        "assignment" => {
            // Plain `name = value` targets only; annotated and tuple targets
            // don't contribute to naming statistics.
            if node.child_by_field_name("type").is_none() {
                if let Some(left) = node.child_by_field_name("left") {
                    if left.kind() == "identifier" {
                        outline.variables.push(node_text(left, source));
                    }
                }
            }
        }
        "function_definition" => {
            if let Some(function) = parse_function(node, source) {
                outline.functions.push(function);
            }
        }
        "class_definition" => {
            if let Some(name) = node.child_by_field_name("name") {
                outline.classes.push(node_text(name, source));
            }
        }
        "import_statement" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                match child.kind() {
                    "dotted_name" => outline.direct_imports.push(node_text(child, source)),
                    "aliased_import" => {
                        if let Some(name) = child.child_by_field_name("name") {
                            outline.direct_imports.push(node_text(name, source));
                        }
                    }
                    _ => {}
                }
            }
        }
        "import_from_statement" => {
            if let Some(module) = node.child_by_field_name("module_name") {
                match module.kind() {
                    "dotted_name" => outline.from_imports.push(node_text(module, source)),
                    "relative_import" => {
                        // `from .mod import x` keeps the module part, a bare
                        // `from . import x` has none to record
                        let mut cursor = module.walk();
                        for part in module.named_children(&mut cursor) {
                            if part.kind() == "dotted_name" {
                                outline.from_imports.push(node_text(part, source));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        "try_statement" => {
            outline.try_count += 1;
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if child.kind() == "except_clause" {
                    collect_handled_types(child, source, &mut outline.except_types);
                }
            }
        }
        "call" => {
            if let Some(call) = parse_call(node, source) {
                outline.calls.push(call);
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, outline);
    }
}

fn parse_function(node: Node, source: &str) -> Option<FunctionInfo> {
    let name = node_text(node.child_by_field_name("name")?, source);

    let mut params = Vec::new();
    if let Some(parameters) = node.child_by_field_name("parameters") {
        let mut cursor = parameters.walk();
        for param in parameters.named_children(&mut cursor) {
            match param.kind() {
                "identifier" => params.push(node_text(param, source)),
                "typed_parameter" => {
                    let mut inner = param.walk();
                    let ident = param
                        .named_children(&mut inner)
                        .find(|c| c.kind() == "identifier");
                    if let Some(ident) = ident {
                        params.push(node_text(ident, source));
                    }
                }
                "default_parameter" | "typed_default_parameter" => {
                    if let Some(name_node) = param.child_by_field_name("name") {
                        params.push(node_text(name_node, source));
                    }
                }
                // *args / **kwargs don't count as positional parameters
                _ => {}
            }
        }
    }

    let mut body_statements = 0;
    let mut calls = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        body_statements = body
            .named_children(&mut cursor)
            .filter(|c| c.kind() != "comment")
            .count();
        collect_calls(body, source, &mut calls);
    }

    Some(FunctionInfo {
        name,
        params,
        body_statements,
        calls,
    })
}

fn collect_calls(node: Node, source: &str, calls: &mut Vec<CallSite>) {
    if node.kind() == "call" {
        if let Some(call) = parse_call(node, source) {
            calls.push(call);
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_calls(child, source, calls);
    }
}

fn parse_call(node: Node, source: &str) -> Option<CallSite> {
    let function = node.child_by_field_name("function")?;
    match function.kind() {
        "attribute" => {
            let method = node_text(function.child_by_field_name("attribute")?, source);
            let receiver = function
                .child_by_field_name("object")
                .filter(|o| o.kind() == "identifier")
                .map(|o| node_text(o, source));
            Some(CallSite {
                receiver,
                method,
                is_method: true,
            })
        }
        "identifier" => Some(CallSite {
            receiver: None,
            method: node_text(function, source),
            is_method: false,
        }),
        _ => None,
    }
}

/// Record the exception type names an `except` clause handles. Only simple
/// identifiers count; dotted exception paths are ignored.
fn collect_handled_types(clause: Node, source: &str, types: &mut Vec<String>) {
    let mut cursor = clause.walk();
    let Some(expression) = clause
        .named_children(&mut cursor)
        .find(|c| c.kind() != "block" && c.kind() != "comment")
    else {
        return;
    };

    match expression.kind() {
        "identifier" => types.push(node_text(expression, source)),
        "tuple" | "parenthesized_expression" => {
            let mut inner = expression.walk();
            for element in expression.named_children(&mut inner) {
                match element.kind() {
                    "identifier" => types.push(node_text(element, source)),
                    "tuple" => {
                        let mut nested = element.walk();
                        for item in element.named_children(&mut nested) {
                            if item.kind() == "identifier" {
                                types.push(node_text(item, source));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

fn node_text(node: Node, source: &str) -> String {
    source[node.byte_range()].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outline(code: &str) -> SourceOutline {
        PythonAnalyzer::new().unwrap().analyze(code).unwrap()
    }

    #[test]
    fn test_names_and_functions() {
        let code = r#"
MAX_SIZE = 10
count = 0

class Widget:
    def render(self, target, depth=1):
        value = compute(target)
        return value

def helper():
    pass
"#;
        let o = outline(code);
        assert_eq!(o.classes, vec!["Widget"]);
        let names: Vec<_> = o.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["render", "helper"]);
        assert_eq!(o.functions[0].params, vec!["self", "target", "depth"]);
        assert!(o.variables.contains(&"MAX_SIZE".to_string()));
        assert!(o.variables.contains(&"count".to_string()));
        assert!(o.variables.contains(&"value".to_string()));
    }

    #[test]
    fn test_imports() {
        let code = "import os.path\nimport json as j\nfrom collections import Counter\nfrom .local import thing\n";
        let o = outline(code);
        assert_eq!(o.direct_imports, vec!["os.path", "json"]);
        assert_eq!(o.from_imports, vec!["collections", "local"]);
    }

    #[test]
    fn test_error_handling() {
        let code = r#"
try:
    risky()
except ValueError:
    pass
except (KeyError, TypeError):
    pass
"#;
        let o = outline(code);
        assert_eq!(o.try_count, 1);
        assert_eq!(o.except_types, vec!["ValueError", "KeyError", "TypeError"]);
    }

    #[test]
    fn test_calls() {
        let code = r#"
def run():
    logger.info("starting")
    print("done")
"#;
        let o = outline(code);
        let logged: Vec<_> = o
            .calls
            .iter()
            .filter(|c| c.is_method)
            .map(|c| (c.receiver.clone(), c.method.clone()))
            .collect();
        assert_eq!(logged, vec![(Some("logger".to_string()), "info".to_string())]);
        assert!(o.calls.iter().any(|c| !c.is_method && c.method == "print"));
        assert_eq!(o.functions[0].calls.len(), 2);
    }
}
