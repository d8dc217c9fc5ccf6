//! Pulling code and error signals out of model responses and command output.

use regex::Regex;

/// Extract Python source from a model response.
///
/// Prefers a ```python fenced block, then any fenced block, then the raw
/// response with conversational preamble stripped.
pub fn extract_python_code(text: &str) -> String {
    if let Ok(re) = Regex::new(r"(?si)```(?:python3|python|py)\b\s*(.*?)```") {
        if let Some(caps) = re.captures(text) {
            if let Some(m) = caps.get(1) {
                return m.as_str().trim().to_string();
            }
        }
    }

    if let Ok(re) = Regex::new(r"(?s)```\s*(.*?)```") {
        if let Some(caps) = re.captures(text) {
            if let Some(m) = caps.get(1) {
                return m.as_str().trim().to_string();
            }
        }
    }

    strip_preamble(text).trim().to_string()
}

/// Drop "Sure, here's the code:" style lead-ins that models prepend when
/// they ignore the output-format instructions. Lead-ins stack, so keep
/// stripping until no prefix matches.
fn strip_preamble(text: &str) -> &str {
    let prefixes = [
        "here's the code:",
        "here's the code",
        "here is the code:",
        "here is the code",
        "below is the code:",
        "below is the code",
        "sure,",
        "sure!",
        "certainly,",
        "certainly!",
    ];

    let mut rest = text.trim_start();
    loop {
        let lowered = rest.to_lowercase();
        let Some(prefix) = prefixes.iter().find(|p| lowered.starts_with(*p)) else {
            return rest;
        };
        rest = rest[prefix.len()..].trim_start();
    }
}

/// A recognized error line from command output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    pub kind: String,
    pub message: String,
}

/// Scan command output for Python exception lines (`SomeError: message`).
pub fn extract_error_messages(output: &str) -> Vec<ErrorMessage> {
    let mut errors = Vec::new();
    if let Ok(re) = Regex::new(r"(\w+Error|Exception): (.+)") {
        for caps in re.captures_iter(output) {
            errors.push(ErrorMessage {
                kind: caps[1].to_string(),
                message: caps[2].trim().to_string(),
            });
        }
    }
    errors
}

/// Collect `.py` paths named in a Python traceback (`File "..."` lines).
pub fn trace_files(output: &str) -> Vec<String> {
    let mut files = Vec::new();
    if let Ok(re) = Regex::new(r#"File "([^"]+\.py)""#) {
        for caps in re.captures_iter(output) {
            let path = caps[1].to_string();
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }
    files
}
