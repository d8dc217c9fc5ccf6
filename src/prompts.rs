//! Prompt assembly for every model call the repair loop makes.
//!
//! These are opaque string builders: the loop never inspects prompt text,
//! it only forwards the result to the completion client.

use crate::extract::trace_files;
use crate::util::{clip, tail};

/// System prompt shared by every call in a repair run.
pub const REPAIR_SYSTEM: &str = r#"You are a senior software engineer specializing in debugging.
You are working on a repository checked out inside an isolated Linux environment.

YOUR PROCESS:
1. Analyze the bug report carefully
2. Create a reproduction script that demonstrates the bug
3. Locate the files that need to change
4. Work from the relevant code sections when files are large
5. Generate fixes iteratively, learning from error feedback
6. Verify the fix works

You learn from failures and try different approaches when needed."#;

/// System prompt for keyword extraction.
pub const ANALYSIS_SYSTEM: &str = "You are a code analysis expert.";

/// System prompt for file location and ranking.
pub const LOCATE_SYSTEM: &str = "You are a software debugging expert.";

/// Issue text is capped to this prefix before being embedded in the
/// keyword-extraction prompt.
const KEYWORD_ISSUE_CHARS: usize = 2000;

/// Build the keyword-extraction prompt. The response must use the strict
/// line-prefixed format that `keywords::parse_response` understands.
pub fn build_keyword_prompt(issue_text: &str) -> String {
    format!(
        r#"Analyze this issue report and extract relevant search keywords.

Issue:
{}

Extract and categorize:
1. Function names mentioned or related to the issue
2. Class names mentioned or related to the issue
3. Variable names or attributes mentioned
4. Error types or exception names
5. Key concepts or technical terms

Respond in this exact format:
FUNCTIONS: func1, func2, func3
CLASSES: Class1, Class2
VARIABLES: var1, var2
ERRORS: ErrorType1, ErrorType2
CONCEPTS: concept1, concept2
"#,
        clip(issue_text, KEYWORD_ISSUE_CHARS)
    )
}

/// Build the reproduction-script prompt.
pub fn build_reproduce_prompt(issue_text: &str, file_listing: &str) -> String {
    let mut prompt = format!(
        r#"You are writing a Python script that reproduces the bug described below.

Issue Description:
{}

Requirements:
1. Write a complete, runnable Python script
2. The script should clearly demonstrate the bug
3. Include comments explaining expected vs actual behavior
4. Use assertions or print statements to show the bug
5. Make the script self-contained (import everything it needs)

Output Format:
Provide ONLY the Python code wrapped in ```python blocks. No explanations outside the code block.
"#,
        issue_text
    );

    if !file_listing.is_empty() {
        prompt.push_str(&format!(
            "\nRepository context (to understand the project structure):\n{}\n",
            clip(file_listing, 500)
        ));
    }

    prompt
}

/// Build the first-attempt fix prompt for one file.
///
/// `sections` names the relevant sections when the file content was
/// filtered down; `error_trace` is the reproduction output.
pub fn build_fix_prompt(
    issue_text: &str,
    file_content: &str,
    file_path: &str,
    error_trace: &str,
    sections: Option<&[String]>,
) -> String {
    let mut prompt = format!(
        "You are fixing a bug.\n\nIssue Description:\n{}\n\nFile to fix: {}\n",
        issue_text, file_path
    );

    if let Some(sections) = sections {
        prompt.push_str(&format!(
            "\nNote: this file has been filtered to show only relevant sections: {}\n",
            sections.join(", ")
        ));
    }

    prompt.push_str(&format!(
        "\nCurrent File Content:\n```python\n{}\n```\n",
        file_content
    ));

    if !error_trace.is_empty() {
        prompt.push_str(&format!(
            "\nError Trace from Reproduction:\n```\n{}\n```\n",
            tail(error_trace, 2000)
        ));
    }

    prompt.push_str(
        r#"
Your Task:
1. Identify the root cause of the bug
2. Provide the COMPLETE fixed version of the file (or section, if filtered)
3. Explain your changes briefly

CRITICAL RULES:
- Provide the ENTIRE content with your fixes applied
- Do NOT truncate or summarize the code
- Maintain all imports, function signatures, and structure
- Only modify the specific lines that fix the bug
- Keep all other code exactly as-is

Output Format:
First, briefly explain what you're changing (2-3 sentences).
Then provide the complete fixed code in a ```python block.
"#,
    );

    prompt
}

/// Build the model-ranked file-location prompt (locator tier 2).
pub fn build_locate_prompt(issue_text: &str, file_listing: &str, error_trace: &str) -> String {
    let mut prompt = format!(
        "You are analyzing a software bug report.\n\nIssue Description:\n{}\n",
        issue_text
    );

    let mentioned = trace_files(error_trace);
    if !mentioned.is_empty() {
        prompt.push_str(&format!(
            "\nFiles mentioned in the error trace:\n{}\n",
            mentioned.join("\n")
        ));
    }

    prompt.push_str(&format!(
        r#"
Repository Structure (sample):
{}

Your Task:
Identify the TOP 3 source code files that most likely need modification to fix this bug.

Consider:
1. Files explicitly mentioned in the issue or error trace
2. Files that match the component or module mentioned
3. Avoid test files unless the issue is about tests

Output Format:
List EXACTLY 3 file paths, one per line, in order of relevance.
No explanations, just paths.
"#,
        file_listing
    ));

    prompt
}

/// Build the whole-file relevance ranking prompt (locator tier 3).
pub fn build_rank_prompt(issue_text: &str, file_listing: &str, max_files: usize) -> String {
    format!(
        r#"Given this issue report, identify which files are most likely to need modification.

Issue:
{}

Available files:
{}

Rank the TOP {} files most likely to contain the bug.
Consider:
1. Files explicitly mentioned in the issue
2. Files related to the error type or component
3. Common naming patterns (e.g. compiler issues -> compiler.py)

Respond with ONLY the file paths, one per line, ranked from most to least relevant.
"#,
        clip(issue_text, 1500),
        clip(file_listing, 3000),
        max_files
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_prompt_caps_issue_text() {
        let long_issue = "x".repeat(5000);
        let prompt = build_keyword_prompt(&long_issue);
        assert!(prompt.contains(&"x".repeat(2000)));
        assert!(!prompt.contains(&"x".repeat(2001)));
        assert!(prompt.contains("FUNCTIONS:"));
    }

    #[test]
    fn test_fix_prompt_mentions_filtered_sections() {
        let sections = vec!["class Widget (score: 18)".to_string()];
        let prompt = build_fix_prompt("bug", "code", "app/models.py", "", Some(&sections));
        assert!(prompt.contains("filtered to show only relevant sections"));
        assert!(prompt.contains("class Widget (score: 18)"));
    }

    #[test]
    fn test_fix_prompt_keeps_error_trace_tail() {
        let trace = format!("{}END_OF_TRACE", "y".repeat(3000));
        let prompt = build_fix_prompt("bug", "code", "a.py", &trace, None);
        assert!(prompt.contains("END_OF_TRACE"));
        assert!(!prompt.contains(&"y".repeat(3000)));
    }

    #[test]
    fn test_locate_prompt_lists_trace_files() {
        let trace = "  File \"pkg/core.py\", line 3, in run\nTypeError: boom";
        let prompt = build_locate_prompt("issue", "pkg/core.py\npkg/other.py", trace);
        assert!(prompt.contains("Files mentioned in the error trace"));
        assert!(prompt.contains("pkg/core.py"));
    }
}
