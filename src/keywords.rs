//! Categorized search terms derived from an issue description.

use crate::llm::CompletionClient;
use crate::prompts::{build_keyword_prompt, ANALYSIS_SYSTEM};
use tracing::{info, warn};

/// Search keywords grouped by category. Set once per run, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keywords {
    pub functions: Vec<String>,
    pub classes: Vec<String>,
    pub variables: Vec<String>,
    pub errors: Vec<String>,
    pub concepts: Vec<String>,
}

impl Keywords {
    /// Total keyword count across all categories.
    pub fn len(&self) -> usize {
        self.functions.len()
            + self.classes.len()
            + self.variables.len()
            + self.errors.len()
            + self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate every keyword regardless of category.
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.functions
            .iter()
            .chain(self.classes.iter())
            .chain(self.variables.iter())
            .chain(self.errors.iter())
            .chain(self.concepts.iter())
    }
}

/// Extract keywords from an issue description with one model call.
///
/// Never aborts the run: any failure degrades to an empty [`Keywords`].
pub async fn extract_keywords(client: &dyn CompletionClient, issue_text: &str) -> Keywords {
    let prompt = build_keyword_prompt(issue_text);
    match client.complete(ANALYSIS_SYSTEM, &prompt, 0.2, 500).await {
        Ok(response) => {
            let keywords = parse_response(&response);
            info!(step = "ANALYZE", count = keywords.len(), "extracted keywords");
            keywords
        }
        Err(err) => {
            warn!(step = "ANALYZE", error = %err, "keyword extraction failed, continuing without keywords");
            Keywords::default()
        }
    }
}

/// Parse the strict line-prefixed response format. Unmatched lines are
/// ignored; a present-but-empty prefix yields an empty list.
pub fn parse_response(response: &str) -> Keywords {
    let mut keywords = Keywords::default();

    for line in response.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("FUNCTIONS:") {
            keywords.functions = split_terms(rest);
        } else if let Some(rest) = line.strip_prefix("CLASSES:") {
            keywords.classes = split_terms(rest);
        } else if let Some(rest) = line.strip_prefix("VARIABLES:") {
            keywords.variables = split_terms(rest);
        } else if let Some(rest) = line.strip_prefix("ERRORS:") {
            keywords.errors = split_terms(rest);
        } else if let Some(rest) = line.strip_prefix("CONCEPTS:") {
            keywords.concepts = split_terms(rest);
        }
    }

    keywords
}

fn split_terms(rest: &str) -> Vec<String> {
    rest.split(',')
        .map(|term| term.trim().to_string())
        .filter(|term| !term.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_response() {
        let response = "FUNCTIONS: parse_header, validate\nCLASSES: HttpParser\nVARIABLES: buf\nERRORS: ValueError\nCONCEPTS: chunked encoding, streaming";
        let keywords = parse_response(response);
        assert_eq!(keywords.functions, vec!["parse_header", "validate"]);
        assert_eq!(keywords.classes, vec!["HttpParser"]);
        assert_eq!(keywords.errors, vec!["ValueError"]);
        assert_eq!(keywords.concepts, vec!["chunked encoding", "streaming"]);
        assert_eq!(keywords.variables, vec!["buf"]);
        assert_eq!(keywords.len(), 7);
    }

    #[test]
    fn test_parse_ignores_unmatched_lines() {
        let response = "Sure! Here are the keywords:\nFUNCTIONS: run\nsome commentary\nERRORS:";
        let keywords = parse_response(response);
        assert_eq!(keywords.functions, vec!["run"]);
        assert!(keywords.errors.is_empty());
        assert!(keywords.classes.is_empty());
    }

    #[test]
    fn test_empty_prefix_yields_empty_list() {
        let keywords = parse_response("FUNCTIONS: , ,\nCLASSES:");
        assert!(keywords.is_empty());
    }

    #[test]
    fn test_all_spans_every_category() {
        let response = "FUNCTIONS: a\nCLASSES: b\nVARIABLES: c\nERRORS: d\nCONCEPTS: e";
        let keywords = parse_response(response);
        let all: Vec<&String> = keywords.all().collect();
        assert_eq!(all.len(), 5);
    }
}
