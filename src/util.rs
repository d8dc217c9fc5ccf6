//! Small string helpers shared across prompt assembly and logging.

/// Truncate a string for display, appending an ellipsis (Unicode-safe).
pub fn truncate(s: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }

    let char_count = s.chars().count();
    if char_count <= max {
        return s.to_string();
    }

    if max <= 3 {
        return s.chars().take(max).collect();
    }

    let truncated: String = s.chars().take(max - 3).collect();
    format!("{}...", truncated)
}

/// Cap a string to its first `max` characters, with no ellipsis.
///
/// Prompt budgets count raw characters; callers that need a visible
/// truncation marker should use [`truncate`] instead.
pub fn clip(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Keep only the last `max` characters of a string (Unicode-safe).
pub fn tail(s: &str, max: usize) -> &str {
    let char_count = s.chars().count();
    if char_count <= max {
        return s;
    }
    match s.char_indices().nth(char_count - max) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
