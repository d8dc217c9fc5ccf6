//! The bug report a repair run works from.

use serde::Deserialize;
use std::fs;
use std::path::Path;

/// A natural-language bug report. Immutable once a repair run starts.
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    /// Stable identifier for the issue (e.g. `django__django-11001`).
    pub id: String,
    /// The full problem description, as written by the reporter.
    pub problem_statement: String,
    /// Optional repository reference (owner/name or URL).
    #[serde(default)]
    pub repo: Option<String>,
}

impl Issue {
    /// Load an issue from a JSON file.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read issue file {}: {}", path.display(), e))?;
        let issue: Issue = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse issue file {}: {}", path.display(), e))?;
        Ok(issue)
    }
}

#[cfg(test)]
mod tests {
    use super::Issue;
    use std::io::Write;

    #[test]
    fn test_issue_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"id": "demo-1", "problem_statement": "Widget.crash() raises TypeError"}}"#
        )
        .unwrap();

        let issue = Issue::from_json_file(file.path()).unwrap();
        assert_eq!(issue.id, "demo-1");
        assert!(issue.problem_statement.contains("TypeError"));
        assert!(issue.repo.is_none());
    }

    #[test]
    fn test_issue_missing_file_errors() {
        let err = Issue::from_json_file(std::path::Path::new("/nonexistent/issue.json"))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
