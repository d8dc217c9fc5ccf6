//! Tree-sitter based structural indexing of Python source.
//!
//! Produces a shallow index (top-level classes with their methods and
//! docstrings, top-level functions, import lines) that the relevance
//! scorer works from. Deliberately does not descend into function bodies.

use std::cell::RefCell;
use tree_sitter::{Node, Parser};

// Tree-sitter parsers are expensive to create but reusable across files,
// so each thread keeps one pre-configured instance.
thread_local! {
    static PYTHON_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        // Ignore error here - will be caught at parse time if language fails
        let _ = p.set_language(&tree_sitter_python::LANGUAGE.into());
        p
    });
}

/// A top-level function declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: String,
    /// 1-based line of the `def`.
    pub line: usize,
    /// First string-literal statement of the body, or empty.
    pub docstring: String,
}

/// A top-level class declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    pub name: String,
    pub line: usize,
    pub methods: Vec<String>,
    pub docstring: String,
}

/// Shallow structural index of one file. Derived per file, discarded after use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuralIndex {
    pub classes: Vec<ClassDecl>,
    pub functions: Vec<FunctionDecl>,
    /// 1-based lines of import statements, in file order.
    pub imports: Vec<usize>,
}

/// Parse Python source into a [`StructuralIndex`].
///
/// Fails when the grammar cannot produce a clean tree; callers fall back to
/// a raw slice of the file instead of aborting.
pub fn parse_python(content: &str) -> anyhow::Result<StructuralIndex> {
    let tree = PYTHON_PARSER
        .with(|p| p.borrow_mut().parse(content, None))
        .ok_or_else(|| anyhow::anyhow!("Failed to parse file"))?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(anyhow::anyhow!("File has syntax errors"));
    }

    let mut index = StructuralIndex::default();

    for i in 0..root.named_child_count() {
        let Some(child) = root.named_child(i) else {
            continue;
        };
        // A decorated def/class reports the decorator's position; index the
        // declaration it wraps but keep the outer node's start line.
        let line = child.start_position().row + 1;
        let decl = unwrap_decorated(child);

        match decl.kind() {
            "function_definition" => {
                if let Some(name) = field_text(&decl, "name", content) {
                    index.functions.push(FunctionDecl {
                        name,
                        line,
                        docstring: body_docstring(&decl, content),
                    });
                }
            }
            "class_definition" => {
                if let Some(name) = field_text(&decl, "name", content) {
                    index.classes.push(ClassDecl {
                        name,
                        line,
                        methods: class_methods(&decl, content),
                        docstring: body_docstring(&decl, content),
                    });
                }
            }
            "import_statement" | "import_from_statement" => {
                index.imports.push(line);
            }
            _ => {}
        }
    }

    Ok(index)
}

/// Check whether generated Python code is syntactically valid.
pub fn validate_python(code: &str) -> Result<(), String> {
    let tree = PYTHON_PARSER
        .with(|p| p.borrow_mut().parse(code, None))
        .ok_or_else(|| "Parser produced no tree".to_string())?;

    let root = tree.root_node();
    if !root.has_error() {
        return Ok(());
    }

    match find_error_line(&root) {
        Some(line) => Err(format!("Syntax error near line {}", line)),
        None => Err("Syntax error".to_string()),
    }
}

fn find_error_line(root: &Node) -> Option<usize> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node.start_position().row + 1);
        }
        if cursor.goto_first_child() {
            continue;
        }
        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

fn unwrap_decorated<'a>(node: Node<'a>) -> Node<'a> {
    if node.kind() == "decorated_definition" {
        if let Some(def) = node.child_by_field_name("definition") {
            return def;
        }
    }
    node
}

fn field_text(node: &Node, field: &str, content: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| node_text(&n, content))
}

fn node_text(node: &Node, content: &str) -> String {
    content[node.start_byte()..node.end_byte()].to_string()
}

/// Names of the function definitions directly inside a class body.
fn class_methods(class_node: &Node, content: &str) -> Vec<String> {
    let mut methods = Vec::new();
    let Some(body) = class_node.child_by_field_name("body") else {
        return methods;
    };

    for i in 0..body.named_child_count() {
        let Some(child) = body.named_child(i) else {
            continue;
        };
        let decl = unwrap_decorated(child);
        if decl.kind() == "function_definition" {
            if let Some(name) = field_text(&decl, "name", content) {
                methods.push(name);
            }
        }
    }

    methods
}

/// First statement of the body when it is a bare string literal, else empty.
fn body_docstring(node: &Node, content: &str) -> String {
    let Some(body) = node.child_by_field_name("body") else {
        return String::new();
    };
    let Some(first) = body.named_child(0) else {
        return String::new();
    };
    if first.kind() != "expression_statement" {
        return String::new();
    }
    let Some(expr) = first.named_child(0) else {
        return String::new();
    };
    if expr.kind() != "string" {
        return String::new();
    }

    // A string node is string_start / string_content / string_end; collect
    // the content parts so the quotes never leak into the index.
    let mut text = String::new();
    for i in 0..expr.named_child_count() {
        if let Some(part) = expr.named_child(i) {
            if part.kind() == "string_content" {
                text.push_str(&node_text(&part, content));
            }
        }
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"import os
from collections import OrderedDict


def top_level(x):
    """Adds one."""
    return x + 1


class Widget:
    """A widget that renders things."""

    def render(self):
        return "ok"

    def crash(self):
        raise TypeError("boom")


def _helper():
    pass
"#;

    #[test]
    fn test_index_top_level_declarations() {
        let index = parse_python(SAMPLE).unwrap();

        assert_eq!(index.imports, vec![1, 2]);

        assert_eq!(index.functions.len(), 2);
        assert_eq!(index.functions[0].name, "top_level");
        assert_eq!(index.functions[0].line, 5);
        assert_eq!(index.functions[0].docstring, "Adds one.");
        assert_eq!(index.functions[1].name, "_helper");
        assert_eq!(index.functions[1].docstring, "");

        assert_eq!(index.classes.len(), 1);
        let class = &index.classes[0];
        assert_eq!(class.name, "Widget");
        assert_eq!(class.line, 10);
        assert_eq!(class.methods, vec!["render", "crash"]);
        assert_eq!(class.docstring, "A widget that renders things.");
    }

    #[test]
    fn test_nested_functions_are_not_top_level() {
        let content = "def outer():\n    def inner():\n        pass\n    return inner\n";
        let index = parse_python(content).unwrap();
        assert_eq!(index.functions.len(), 1);
        assert_eq!(index.functions[0].name, "outer");
    }

    #[test]
    fn test_decorated_definitions_are_indexed() {
        let content = "@cached\ndef fetch():\n    pass\n\n@register\nclass Handler:\n    def handle(self):\n        pass\n";
        let index = parse_python(content).unwrap();
        assert_eq!(index.functions[0].name, "fetch");
        assert_eq!(index.functions[0].line, 1);
        assert_eq!(index.classes[0].name, "Handler");
        assert_eq!(index.classes[0].methods, vec!["handle"]);
    }

    #[test]
    fn test_parse_failure_is_an_error() {
        assert!(parse_python("def broken(:\n    pass\n").is_err());
    }

    #[test]
    fn test_validate_python() {
        assert!(validate_python("x = 1\n").is_ok());
        let err = validate_python("def broken(:\n    pass\n").unwrap_err();
        assert!(err.contains("Syntax error"));
    }
}
