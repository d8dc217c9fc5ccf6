//! Unified diff creation, parsing, and application.
//!
//! Diffs use standard `a/<path>` / `b/<path>` headers with no extensions.
//! Creation goes through `similar`; parse/apply is hand-rolled so callers
//! can re-apply a produced patch to the original content exactly.

use similar::TextDiff;

/// Produce a unified diff between two versions of one file.
///
/// Returns an empty string when the contents are identical.
pub fn create_unified_diff(original: &str, modified: &str, path: &str) -> String {
    if original == modified {
        return String::new();
    }

    TextDiff::from_lines(original, modified)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{}", path), &format!("b/{}", path))
        .to_string()
}

/// A single line in a diff hunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    Context(String),
    Add(String),
    Remove(String),
}

/// A hunk in a unified diff
#[derive(Debug, Clone, PartialEq)]
pub struct DiffHunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<DiffLine>,
}

/// A parsed unified diff
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedDiff {
    pub old_path: String,
    pub new_path: String,
    pub hunks: Vec<DiffHunk>,
    /// True when the new content does not end with a newline
    /// (`\ No newline at end of file` closes the diff).
    pub no_newline_at_end: bool,
}

/// Parse a unified diff string into structured data
pub fn parse_unified_diff(diff: &str) -> Result<UnifiedDiff, String> {
    let lines: Vec<&str> = diff.lines().collect();

    if lines.len() < 3 {
        return Err("Diff too short".to_string());
    }

    let mut old_path = String::new();
    let mut new_path = String::new();
    let mut start_idx = 0;

    for (i, line) in lines.iter().enumerate() {
        if line.starts_with("--- ") {
            old_path = line[4..].trim_start_matches("a/").to_string();
            if let Some(tab_pos) = old_path.find('\t') {
                old_path = old_path[..tab_pos].to_string();
            }
        } else if line.starts_with("+++ ") {
            new_path = line[4..].trim_start_matches("b/").to_string();
            if let Some(tab_pos) = new_path.find('\t') {
                new_path = new_path[..tab_pos].to_string();
            }
            start_idx = i + 1;
            break;
        }
    }

    if old_path.is_empty() || new_path.is_empty() {
        return Err("Could not find file paths in diff".to_string());
    }

    let mut hunks = Vec::new();
    let mut i = start_idx;

    while i < lines.len() {
        if lines[i].starts_with("@@ ") {
            let hunk = parse_hunk(&lines, &mut i)?;
            hunks.push(hunk);
        } else {
            i += 1;
        }
    }

    if hunks.is_empty() {
        return Err("No hunks found in diff".to_string());
    }

    let no_newline_at_end = lines
        .last()
        .map(|l| l.starts_with('\\'))
        .unwrap_or(false);

    Ok(UnifiedDiff {
        old_path,
        new_path,
        hunks,
        no_newline_at_end,
    })
}

/// Parse a single hunk from the diff
fn parse_hunk(lines: &[&str], idx: &mut usize) -> Result<DiffHunk, String> {
    let header = lines[*idx];

    // @@ -old_start,old_count +new_start,new_count @@
    let parts: Vec<&str> = header.split_whitespace().collect();
    if parts.len() < 4 || parts[0] != "@@" {
        return Err(format!("Invalid hunk header: {}", header));
    }

    let (old_start, old_count) = parse_range(parts[1].trim_start_matches('-'))?;
    let (new_start, new_count) = parse_range(parts[2].trim_start_matches('+'))?;

    *idx += 1;
    let mut diff_lines = Vec::new();

    while *idx < lines.len() {
        let line = lines[*idx];

        if line.starts_with("@@ ") || line.starts_with("diff ") {
            break;
        }

        if line.starts_with('+') && !line.starts_with("+++") {
            diff_lines.push(DiffLine::Add(line[1..].to_string()));
        } else if line.starts_with('-') && !line.starts_with("---") {
            diff_lines.push(DiffLine::Remove(line[1..].to_string()));
        } else if line.starts_with(' ') || line.is_empty() {
            let content = if line.is_empty() { "" } else { &line[1..] };
            diff_lines.push(DiffLine::Context(content.to_string()));
        }
        // Skip other lines (like "\ No newline at end of file")

        *idx += 1;
    }

    Ok(DiffHunk {
        old_start,
        old_count,
        new_start,
        new_count,
        lines: diff_lines,
    })
}

/// Parse a range like "10,5" or "10" into (start, count)
fn parse_range(s: &str) -> Result<(usize, usize), String> {
    if let Some(comma) = s.find(',') {
        let start: usize = s[..comma]
            .parse()
            .map_err(|_| format!("Invalid start: {}", s))?;
        let count: usize = s[comma + 1..]
            .parse()
            .map_err(|_| format!("Invalid count: {}", s))?;
        Ok((start, count))
    } else {
        let start: usize = s.parse().map_err(|_| format!("Invalid line number: {}", s))?;
        Ok((start, 1))
    }
}

/// Apply a unified diff to the original content.
pub fn apply_diff(original: &str, diff: &UnifiedDiff) -> Result<String, String> {
    let mut lines: Vec<String> = original.lines().map(|s| s.to_string()).collect();

    // Apply hunks in reverse order so line numbers don't shift
    for hunk in diff.hunks.iter().rev() {
        lines = apply_hunk(lines, hunk)?;
    }

    let mut result = lines.join("\n");
    if !diff.no_newline_at_end && !result.is_empty() {
        result.push('\n');
    }
    Ok(result)
}

/// Apply a single hunk to the lines
fn apply_hunk(mut lines: Vec<String>, hunk: &DiffHunk) -> Result<Vec<String>, String> {
    let start = hunk.old_start.saturating_sub(1); // Convert to 0-indexed

    let mut new_section = Vec::new();
    for diff_line in &hunk.lines {
        match diff_line {
            DiffLine::Context(s) | DiffLine::Add(s) => {
                new_section.push(s.clone());
            }
            DiffLine::Remove(_) => {}
        }
    }

    let remove_count = hunk
        .lines
        .iter()
        .filter(|l| matches!(l, DiffLine::Context(_) | DiffLine::Remove(_)))
        .count();

    let end = (start + remove_count).min(lines.len());
    lines.splice(start..end, new_section);

    Ok(lines)
}
