//! Finding the files a fix should touch.
//!
//! Three tiers, cheapest first: paths named verbatim in the issue text,
//! then a model call over the issue plus reproduction output, then a
//! model ranking of the repository listing. The first tier that yields
//! anything wins.

use crate::llm::CompletionClient;
use crate::prompts::{build_locate_prompt, build_rank_prompt, LOCATE_SYSTEM};
use regex::Regex;
use tracing::{debug, info, warn};

/// Hard cap on candidate files per run.
pub const MAX_TARGET_FILES: usize = 3;

/// Pull source file paths named verbatim in free text.
///
/// Matches backticked, quoted, and bare `.py` paths, deduplicates in
/// first-seen order, and caps the result at [`MAX_TARGET_FILES`].
pub fn mentioned_paths(text: &str) -> Vec<String> {
    let patterns = [
        r"`([\w./-]+\.py)`",
        r#""([\w./-]+\.py)""#,
        r"'([\w./-]+\.py)'",
        r"(?:^|\s)([\w-]+(?:/[\w.-]+)*\.py)",
    ];

    let mut found: Vec<String> = Vec::new();
    for pattern in patterns {
        let re = Regex::new(pattern).expect("path pattern is valid");
        for cap in re.captures_iter(text) {
            let path = cap[1].to_string();
            if !found.contains(&path) {
                found.push(path);
            }
        }
    }

    found.truncate(MAX_TARGET_FILES);
    found
}

/// Normalize one line of a model's file-list response into a path, if it
/// looks like one.
fn clean_response_line(line: &str) -> Option<String> {
    let mut line = line.trim();

    // Strip list numbering ("1." / "2)") and bullet markers.
    let numbering = Regex::new(r"^\d+[.)]\s*").expect("numbering pattern is valid");
    let stripped = numbering.replace(line, "");
    line = stripped.trim();
    line = line
        .trim_start_matches(['-', '*'])
        .trim()
        .trim_matches(['`', '"', '\''])
        .trim();

    if line.ends_with(".py") && !line.contains(' ') {
        Some(line.to_string())
    } else {
        None
    }
}

fn parse_file_response(response: &str) -> Vec<String> {
    let mut files: Vec<String> = Vec::new();
    for line in response.lines() {
        if let Some(path) = clean_response_line(line) {
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }
    files.truncate(MAX_TARGET_FILES);
    files
}

/// Locate the files most likely to need modification.
///
/// Returns at most [`MAX_TARGET_FILES`] paths; an empty result means the
/// run cannot proceed to the fix stage.
pub async fn locate_files(
    client: &dyn CompletionClient,
    issue_text: &str,
    file_listing: &[String],
    repro_output: &str,
) -> Vec<String> {
    // Tier 1: the issue names the files outright.
    let explicit = mentioned_paths(issue_text);
    if !explicit.is_empty() {
        info!(step = "LOCATE", files = ?explicit, "issue names target files explicitly");
        return explicit;
    }

    let listing = file_listing.join("\n");

    // Tier 2: let the model reason over the issue and the error trace.
    let prompt = build_locate_prompt(issue_text, &listing, repro_output);
    match client.complete(LOCATE_SYSTEM, &prompt, 0.2, 300).await {
        Ok(response) => {
            let files = parse_file_response(&response);
            if !files.is_empty() {
                info!(step = "LOCATE", files = ?files, "model located target files");
                return files;
            }
            debug!(step = "LOCATE", "location response contained no usable paths");
        }
        Err(err) => {
            warn!(step = "LOCATE", error = %err, "file location call failed");
        }
    }

    // Tier 3: rank the raw listing.
    let prompt = build_rank_prompt(issue_text, &listing, MAX_TARGET_FILES);
    match client.complete(LOCATE_SYSTEM, &prompt, 0.2, 300).await {
        Ok(response) => {
            let files = parse_file_response(&response);
            info!(step = "LOCATE", files = ?files, "ranked repository listing");
            files
        }
        Err(err) => {
            warn!(step = "LOCATE", error = %err, "file ranking call failed");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// A client that must never be called.
    struct UnreachableClient;

    #[async_trait]
    impl CompletionClient for UnreachableClient {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _temperature: f32,
            _max_tokens: u32,
        ) -> anyhow::Result<String> {
            panic!("model call made when explicit paths were available");
        }
    }

    /// A client that replies with a fixed response.
    struct FixedClient(&'static str);

    #[async_trait]
    impl CompletionClient for FixedClient {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _temperature: f32,
            _max_tokens: u32,
        ) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_mentioned_paths_backticks_and_quotes() {
        let text = "The bug is in `app/models.py` and also \"lib/util.py\".";
        assert_eq!(mentioned_paths(text), vec!["app/models.py", "lib/util.py"]);
    }

    #[test]
    fn test_mentioned_paths_bare_and_deduped() {
        let text = "See pkg/core.py, and again `pkg/core.py` plus pkg/extra.py";
        assert_eq!(mentioned_paths(text), vec!["pkg/core.py", "pkg/extra.py"]);
    }

    #[test]
    fn test_mentioned_paths_caps_at_three() {
        let text = "`a.py` `b.py` `c.py` `d.py`";
        assert_eq!(mentioned_paths(text).len(), MAX_TARGET_FILES);
    }

    #[test]
    fn test_parse_file_response_strips_decoration() {
        let response = "1. `app/models.py`\n- src/views.py\nSome explanation here\n2) 'tests/test_x.py'";
        assert_eq!(
            parse_file_response(response),
            vec!["app/models.py", "src/views.py", "tests/test_x.py"]
        );
    }

    #[test]
    fn test_parse_file_response_rejects_non_python() {
        let response = "README.md\napp/models.py\nnot a path at all";
        assert_eq!(parse_file_response(response), vec!["app/models.py"]);
    }

    #[tokio::test]
    async fn test_explicit_paths_skip_model_entirely() {
        let files = locate_files(
            &UnreachableClient,
            "Crash in `app/models.py` when saving",
            &["app/models.py".to_string(), "app/views.py".to_string()],
            "",
        )
        .await;
        assert_eq!(files, vec!["app/models.py"]);
    }

    #[tokio::test]
    async fn test_model_tier_used_when_issue_names_nothing() {
        let client = FixedClient("app/views.py\napp/forms.py\napp/urls.py");
        let files = locate_files(
            &client,
            "Saving a form silently drops a field",
            &["app/views.py".to_string()],
            "",
        )
        .await;
        assert_eq!(files, vec!["app/views.py", "app/forms.py", "app/urls.py"]);
    }
}
