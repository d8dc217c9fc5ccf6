//! Append-only record of fix attempts and the retry prompts built from it.

use crate::util::{tail, truncate};

/// One fix-and-verify cycle: the file changed, the code applied, the
/// resulting output, and whether verification passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based, monotonic, gapless; assigned at record time.
    pub attempt_num: usize,
    pub file_path: String,
    pub code_applied: String,
    pub error_output: String,
    pub success: bool,
}

/// Linear history of attempts for one repair run.
///
/// Append-only: the latest failure feeds the next prompt, and nothing is
/// ever rewritten or reused.
#[derive(Debug)]
pub struct AttemptLedger {
    attempts: Vec<Attempt>,
    max_attempts: usize,
}

impl AttemptLedger {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            attempts: Vec::new(),
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Record an attempt together with its verification result. The
    /// attempt number is `len + 1` at record time — callers never pick one.
    pub fn record(
        &mut self,
        file_path: String,
        code_applied: String,
        error_output: String,
        success: bool,
    ) -> usize {
        let attempt_num = self.attempts.len() + 1;
        self.attempts.push(Attempt {
            attempt_num,
            file_path,
            code_applied,
            error_output,
            success,
        });
        attempt_num
    }

    /// Attempts left in the budget.
    pub fn remaining(&self) -> usize {
        self.max_attempts.saturating_sub(self.attempts.len())
    }

    /// Error output of the most recent attempt, if any.
    pub fn latest_error(&self) -> Option<&str> {
        self.attempts.last().map(|a| a.error_output.as_str())
    }

    /// Build the prompt for a retry round. Always incorporates the most
    /// recently recorded error alongside the caller-supplied current one.
    pub fn build_retry_prompt(
        &self,
        issue_text: &str,
        file_content: &str,
        file_path: &str,
        current_error: &str,
    ) -> String {
        let mut prompt = format!(
            "You are fixing a bug. A previous fix attempt did not resolve it.\n\nIssue Description:\n{}\n\nFile to fix: {}\n",
            issue_text, file_path
        );

        if !self.attempts.is_empty() {
            prompt.push_str("\nPrevious attempts (all failed):\n");
            for attempt in self.attempts.iter().rev().take(2).rev() {
                prompt.push_str(&format!(
                    "\nAttempt {}:\n- Error: {}\n",
                    attempt.attempt_num,
                    truncate(&attempt.error_output, 200)
                ));
            }
        }

        if let Some(latest) = self.latest_error() {
            prompt.push_str(&format!(
                "\nMost recent error:\n```\n{}\n```\n",
                tail(latest, 2000)
            ));
        }

        if !current_error.is_empty() {
            prompt.push_str(&format!(
                "\nCurrent error output:\n```\n{}\n```\n",
                tail(current_error, 2000)
            ));
        }

        prompt.push_str(&format!(
            r#"
Current File Content:
```python
{}
```

Your Task:
1. Analyze why the previous fix failed
2. Try a DIFFERENT approach to fixing the bug
3. Provide the COMPLETE fixed version of the content above

Output Format:
Briefly explain what you're changing differently, then provide the complete fixed code in a ```python block.
"#,
            file_content
        ));

        prompt
    }

    /// Human-readable recap of every attempt, for the run log.
    pub fn summary(&self) -> String {
        if self.attempts.is_empty() {
            return "No fix attempts were made.".to_string();
        }

        let mut lines = vec![format!(
            "Attempt history ({}/{} used):",
            self.attempts.len(),
            self.max_attempts
        )];
        for attempt in &self.attempts {
            let status = if attempt.success { "ok" } else { "failed" };
            lines.push(format!(
                "  {}. [{}] {} - {}",
                attempt.attempt_num,
                status,
                attempt.file_path,
                truncate(&attempt.error_output, 120)
            ));
        }
        lines.join("\n")
    }
}
