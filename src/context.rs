//! Relevance scoring and section extraction for large files.
//!
//! When a file is too big to hand to the model whole, the scorer ranks its
//! top-level declarations against the issue keywords and the extractor
//! packs the best-scoring code blocks into a character budget.

use crate::keywords::Keywords;
use crate::structure::{parse_python, StructuralIndex};
use crate::util::clip;
use std::ops::Range;
use tracing::debug;

// Relevance weights. Cheap, recall-favoring heuristics; kept at these exact
// values for parity with the scoring behavior the loop was tuned against.
const NAME_MATCH_SCORE: u32 = 10;
const METHOD_MATCH_SCORE: u32 = 5;
const DOCSTRING_MATCH_SCORE: u32 = 2;
const ERROR_MATCH_SCORE: u32 = 8;

/// Default character budget for packed sections.
pub const DEFAULT_MAX_CHARS: usize = 20_000;

/// Lines kept when nothing scores above zero.
const FALLBACK_HEAD_LINES: usize = 200;

/// Label attached to the fallback section.
pub const FALLBACK_LABEL: &str = "File header (no specific matches)";

/// Separator between packed sections in the extracted text.
const SECTION_SEPARATOR: &str = "\n\n# ===== RELEVANT SECTIONS =====\n\n";

/// What kind of declaration a scored item refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Class,
    Function,
}

impl DeclKind {
    pub fn label(&self) -> &'static str {
        match self {
            DeclKind::Class => "class",
            DeclKind::Function => "function",
        }
    }
}

/// A declaration with its relevance score. Ties keep declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredItem {
    pub kind: DeclKind,
    pub name: String,
    /// 1-based line of the declaration.
    pub line: usize,
    pub score: u32,
}

/// The packed result handed to prompt building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContext {
    /// Concatenated sections (or the fallback slice).
    pub text: String,
    /// One label per included section, e.g. `class Widget (score: 18)`.
    pub sections: Vec<String>,
}

/// Score one declaration against the keywords. Additive, non-negative:
/// +10 per function/class keyword matching the name, +5 per function
/// keyword matching a method name, +2 per keyword (any category) matching
/// the docstring, +8 per error keyword matching name or docstring. All
/// matches are case-insensitive substring tests.
pub fn score_declaration(
    name: &str,
    methods: &[String],
    docstring: &str,
    keywords: &Keywords,
) -> u32 {
    let mut score = 0;
    let name_lower = name.to_lowercase();
    let doc_lower = docstring.to_lowercase();

    for keyword in keywords.functions.iter().chain(keywords.classes.iter()) {
        if name_lower.contains(&keyword.to_lowercase()) {
            score += NAME_MATCH_SCORE;
        }
    }

    for method in methods {
        let method_lower = method.to_lowercase();
        for keyword in &keywords.functions {
            if method_lower.contains(&keyword.to_lowercase()) {
                score += METHOD_MATCH_SCORE;
            }
        }
    }

    for keyword in keywords.all() {
        if doc_lower.contains(&keyword.to_lowercase()) {
            score += DOCSTRING_MATCH_SCORE;
        }
    }

    for error in &keywords.errors {
        let error_lower = error.to_lowercase();
        if name_lower.contains(&error_lower) || doc_lower.contains(&error_lower) {
            score += ERROR_MATCH_SCORE;
        }
    }

    score
}

/// Score every declaration in an index; zero-scoring declarations are
/// excluded. Sorted descending by score (stable, so ties keep file order:
/// classes first, then functions, as the index lists them).
pub fn score_index(index: &StructuralIndex, keywords: &Keywords) -> Vec<ScoredItem> {
    let mut items = Vec::new();

    for class in &index.classes {
        let score = score_declaration(&class.name, &class.methods, &class.docstring, keywords);
        if score > 0 {
            items.push(ScoredItem {
                kind: DeclKind::Class,
                name: class.name.clone(),
                line: class.line,
                score,
            });
        }
    }

    for function in &index.functions {
        let score = score_declaration(&function.name, &[], &function.docstring, keywords);
        if score > 0 {
            items.push(ScoredItem {
                kind: DeclKind::Function,
                name: function.name.clone(),
                line: function.line,
                score,
            });
        }
    }

    items.sort_by_key(|item| std::cmp::Reverse(item.score));
    items
}

/// Extract the contiguous block starting at `start_line` (1-based): extend
/// through lines that are blank or more indented than the start, stop at
/// the first non-blank line with indentation at or below the start's.
pub fn extract_block(lines: &[&str], start_line: usize) -> Option<(String, Range<usize>)> {
    if start_line == 0 || start_line > lines.len() {
        return None;
    }

    let start_idx = start_line - 1;
    let base_indent = indent_of(lines[start_idx]);

    let mut end_idx = start_idx + 1;
    while end_idx < lines.len() {
        let line = lines[end_idx];
        if !line.trim().is_empty() && indent_of(line) <= base_indent {
            break;
        }
        end_idx += 1;
    }

    Some((lines[start_idx..end_idx].join("\n"), start_idx..end_idx))
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Pack the highest-scoring sections of `content` into `max_chars`.
///
/// Strictly greedy: sections are taken in descending score order and a
/// section is included only if it fits the remaining budget — oversized
/// sections are skipped, never truncated. When nothing scores above zero
/// the first 200 lines are returned as a single labeled fallback section.
/// Fails when the file cannot be parsed; callers substitute a raw slice.
pub fn extract_relevant_sections(
    content: &str,
    keywords: &Keywords,
    max_chars: usize,
) -> anyhow::Result<ExtractedContext> {
    let index = parse_python(content)?;
    let scored = score_index(&index, keywords);
    debug!(
        step = "EXTRACT",
        candidates = scored.len(),
        top_scores = ?scored.iter().take(5).map(|i| i.score).collect::<Vec<_>>(),
        "scored declarations"
    );

    let lines: Vec<&str> = content.lines().collect();
    let mut packed: Vec<String> = Vec::new();
    let mut labels: Vec<String> = Vec::new();
    let mut used_chars = 0usize;

    for item in &scored {
        if used_chars >= max_chars {
            break;
        }

        let Some((section, _span)) = extract_block(&lines, item.line) else {
            continue;
        };

        // Separator overhead counts against the budget too, so the final
        // joined text can never exceed max_chars.
        let cost = section.chars().count()
            + if packed.is_empty() {
                0
            } else {
                SECTION_SEPARATOR.len()
            };

        if used_chars + cost <= max_chars {
            used_chars += cost;
            packed.push(section);
            labels.push(format!(
                "{} {} (score: {})",
                item.kind.label(),
                item.name,
                item.score
            ));
        }
    }

    if packed.is_empty() {
        let head: Vec<&str> = lines.iter().take(FALLBACK_HEAD_LINES).copied().collect();
        let text = clip(&head.join("\n"), max_chars).to_string();
        return Ok(ExtractedContext {
            text,
            sections: vec![FALLBACK_LABEL.to_string()],
        });
    }

    Ok(ExtractedContext {
        text: packed.join(SECTION_SEPARATOR),
        sections: labels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords_with_functions(functions: &[&str]) -> Keywords {
        Keywords {
            functions: functions.iter().map(|s| s.to_string()).collect(),
            ..Keywords::default()
        }
    }

    #[test]
    fn test_score_name_match() {
        let keywords = keywords_with_functions(&["parse_header"]);
        assert_eq!(score_declaration("parse_header", &[], "", &keywords), 10);
        assert_eq!(score_declaration("unrelated", &[], "", &keywords), 0);
    }

    #[test]
    fn test_score_method_and_error_matches() {
        let keywords = Keywords {
            functions: vec!["render".to_string()],
            errors: vec!["TypeError".to_string()],
            ..Keywords::default()
        };
        let methods = vec!["render".to_string(), "other".to_string()];
        // +5 method match, +2 docstring match, +8 error match.
        assert_eq!(
            score_declaration("Widget", &methods, "Raises TypeError on bad input", &keywords),
            5 + 2 + 8
        );
    }

    #[test]
    fn test_score_is_monotonic_in_keywords() {
        let base = keywords_with_functions(&["parse"]);
        let mut more = base.clone();
        more.errors.push("ValueError".to_string());

        let before = score_declaration("parse_config", &[], "Raises ValueError", &base);
        let after = score_declaration("parse_config", &[], "Raises ValueError", &more);
        assert!(after >= before);
    }

    #[test]
    fn test_extract_block_stops_at_same_indent() {
        let source = "def a():\n    x = 1\n\n    y = 2\ndef b():\n    pass";
        let lines: Vec<&str> = source.lines().collect();
        let (block, span) = extract_block(&lines, 1).unwrap();
        assert_eq!(block, "def a():\n    x = 1\n\n    y = 2");
        assert_eq!(span, 0..4);
    }

    #[test]
    fn test_extract_block_out_of_range() {
        let lines = vec!["x = 1"];
        assert!(extract_block(&lines, 0).is_none());
        assert!(extract_block(&lines, 2).is_none());
    }

    #[test]
    fn test_zero_scores_yield_head_fallback() {
        let mut source = String::new();
        for i in 0..300 {
            source.push_str(&format!("unrelated_{} = {}\n", i, i));
        }
        let result =
            extract_relevant_sections(&source, &Keywords::default(), DEFAULT_MAX_CHARS).unwrap();
        assert_eq!(result.sections, vec![FALLBACK_LABEL.to_string()]);
        let expected: Vec<&str> = source.lines().take(200).collect();
        assert_eq!(result.text, expected.join("\n"));
    }

    #[test]
    fn test_budget_is_never_exceeded() {
        let mut source = String::new();
        for i in 0..40 {
            source.push_str(&format!(
                "def parse_header_{}():\n    value = {}\n    return value * 2\n\n\n",
                i, i
            ));
        }
        let keywords = keywords_with_functions(&["parse_header"]);

        for max_chars in [50, 200, 1000, 5000] {
            let result = extract_relevant_sections(&source, &keywords, max_chars).unwrap();
            assert!(
                result.text.chars().count() <= max_chars,
                "budget {} exceeded: {}",
                max_chars,
                result.text.chars().count()
            );
        }
    }

    #[test]
    fn test_large_file_includes_matching_function_only() {
        // A ~30k char file where only parse_header matches the keywords.
        let mut source = String::from("def parse_header(data):\n    \"\"\"Parse a header.\"\"\"\n    return data.split(':')\n\n\n");
        for i in 0..200 {
            source.push_str(&format!(
                "def unrelated_{}():\n    filler = \"{}\"\n    return filler\n\n\n",
                i,
                "x".repeat(120)
            ));
        }
        assert!(source.chars().count() > 25_000);

        let keywords = keywords_with_functions(&["parse_header"]);
        let result = extract_relevant_sections(&source, &keywords, DEFAULT_MAX_CHARS).unwrap();

        assert_eq!(result.sections.len(), 1);
        assert!(result.sections[0].starts_with("function parse_header (score: 1"));
        assert!(result.text.contains("def parse_header"));
        assert!(!result.text.contains("unrelated_0"));
        assert!(result.text.chars().count() <= DEFAULT_MAX_CHARS);
    }

    #[test]
    fn test_ties_keep_declaration_order() {
        let source = "def parse_a():\n    pass\n\ndef parse_b():\n    pass\n";
        let keywords = keywords_with_functions(&["parse"]);
        let index = parse_python(source).unwrap();
        let scored = score_index(&index, &keywords);
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].name, "parse_a");
        assert_eq!(scored[1].name, "parse_b");
    }

    #[test]
    fn test_oversized_section_is_skipped_not_truncated() {
        // First declaration is huge, second is small; with a tight budget
        // the huge one must be skipped entirely and the small one packed.
        let mut source = String::from("def parse_big():\n");
        for i in 0..100 {
            source.push_str(&format!("    filler_{} = {}\n", i, i));
        }
        source.push_str("\ndef parse_small():\n    pass\n");

        let keywords = keywords_with_functions(&["parse"]);
        let result = extract_relevant_sections(&source, &keywords, 120).unwrap();
        assert_eq!(result.sections.len(), 1);
        assert!(result.sections[0].contains("parse_small"));
        assert!(!result.text.contains("filler_0"));
    }
}
