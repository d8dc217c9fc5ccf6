//! The end-to-end repair loop.
//!
//! One [`RepairLoop`] owns one issue, one sandbox, and one completion
//! client, and drives reproduce, locate, fix, and verify until the bug is
//! fixed or the attempt budget runs out. The sandbox is released on every
//! exit path, including errors.

use crate::config::RunSettings;
use crate::context::extract_relevant_sections;
use crate::extract::{extract_error_messages, extract_python_code};
use crate::issue::Issue;
use crate::keywords::{extract_keywords, Keywords};
use crate::ledger::AttemptLedger;
use crate::llm::CompletionClient;
use crate::locate::locate_files;
use crate::patch::create_unified_diff;
use crate::prompts::{build_fix_prompt, build_reproduce_prompt, REPAIR_SYSTEM};
use crate::sandbox::Sandbox;
use crate::structure::validate_python;
use crate::util::clip;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Where the generated reproduction script lives in the sandbox.
const REPRO_SCRIPT: &str = "reproduce_issue.py";

/// Files listed when building prompts about the repository.
const MAX_LISTED_FILES: usize = 100;

/// Drives a full repair run for one issue.
pub struct RepairLoop {
    issue: Issue,
    client: Arc<dyn CompletionClient>,
    sandbox: Box<dyn Sandbox>,
    settings: RunSettings,
    keywords: Keywords,
    target_files: Vec<String>,
    repro_output: String,
    patches: Vec<String>,
    ledger: AttemptLedger,
}

impl RepairLoop {
    pub fn new(
        issue: Issue,
        client: Arc<dyn CompletionClient>,
        sandbox: Box<dyn Sandbox>,
        settings: RunSettings,
    ) -> Self {
        let ledger = AttemptLedger::new(settings.max_attempts);
        Self {
            issue,
            client,
            sandbox,
            settings,
            keywords: Keywords::default(),
            target_files: Vec::new(),
            repro_output: String::new(),
            patches: Vec::new(),
            ledger,
        }
    }

    /// Run the whole loop. Returns whether the bug was fixed and verified.
    ///
    /// The sandbox is released before returning, whatever happened.
    pub async fn run(&mut self) -> bool {
        info!(issue = %self.issue.id, "starting repair run");
        let result = self.run_inner().await;
        self.sandbox.cleanup();

        match result {
            Ok(success) => {
                info!(
                    issue = %self.issue.id,
                    success,
                    "repair run finished\n{}",
                    self.ledger.summary()
                );
                success
            }
            Err(err) => {
                error!(issue = %self.issue.id, error = %err, "repair run aborted");
                false
            }
        }
    }

    /// Combined patch for everything applied during the run. Empty when no
    /// file was changed.
    pub fn patch(&self) -> String {
        self.patches.join("\n\n")
    }

    pub fn ledger(&self) -> &AttemptLedger {
        &self.ledger
    }

    async fn run_inner(&mut self) -> anyhow::Result<bool> {
        self.sandbox.start()?;

        self.keywords = extract_keywords(&*self.client, &self.issue.problem_statement).await;

        if !self.reproduce().await? {
            info!(step = "REPRODUCE", "could not reproduce the issue, stopping");
            return Ok(false);
        }

        let listing = self.sandbox.list_files(MAX_LISTED_FILES)?;
        self.target_files = locate_files(
            &*self.client,
            &self.issue.problem_statement,
            &listing,
            &self.repro_output,
        )
        .await;

        if self.target_files.is_empty() {
            info!(step = "LOCATE", "no candidate files found, stopping");
            return Ok(false);
        }

        self.fix_with_retry().await
    }

    /// Generate and run a reproduction script. Success means the script
    /// demonstrated the bug: nonzero exit or an error in its output.
    async fn reproduce(&mut self) -> anyhow::Result<bool> {
        let listing = self.sandbox.list_files(MAX_LISTED_FILES)?.join("\n");
        let prompt = build_reproduce_prompt(&self.issue.problem_statement, &listing);
        let response = self.client.complete(REPAIR_SYSTEM, &prompt, 0.3, 4096).await?;

        let code = extract_python_code(&response);
        if code.trim().is_empty() {
            warn!(step = "REPRODUCE", "model produced no script");
            return Ok(false);
        }
        if let Err(err) = validate_python(&code) {
            warn!(step = "REPRODUCE", error = %err, "reproduction script has invalid syntax");
            return Ok(false);
        }

        self.sandbox.write_file(REPRO_SCRIPT, &code)?;
        let (exit_code, output) = self
            .sandbox
            .run_command(&format!("python {}", REPRO_SCRIPT), self.settings.repro_timeout)?;
        self.repro_output = output;

        let reproduced = exit_code != 0
            || self.repro_output.contains("AssertionError")
            || self.repro_output.contains("Error");
        info!(step = "REPRODUCE", exit_code, reproduced, "ran reproduction script");
        Ok(reproduced)
    }

    /// Fix rounds: each round applies a fix to the first candidate file
    /// that yields one, verifies, and records the attempt.
    async fn fix_with_retry(&mut self) -> anyhow::Result<bool> {
        let candidates = self.target_files.clone();

        for round in 1..=self.settings.max_attempts {
            info!(
                step = "FIX",
                round,
                max = self.settings.max_attempts,
                "starting fix round"
            );

            let mut applied: Option<(String, String)> = None;
            for path in &candidates {
                if let Some(code) = self.try_fix_file(path, round).await? {
                    applied = Some((path.clone(), code));
                    break;
                }
            }

            // A round with nothing applicable burns budget but records no
            // attempt; the ledger only ever holds verified outcomes, so the
            // next retry prompt still carries the last real error.
            let Some((path, code)) = applied else {
                info!(step = "FIX", round, "no usable fix was generated this round");
                continue;
            };

            let (verified, output) = self.verify().await?;
            self.ledger.record(path, code, output, verified);

            if verified {
                info!(step = "VERIFY", round, "fix verified");
                return Ok(true);
            }
            info!(step = "VERIFY", round, "fix did not resolve the issue");
        }

        Ok(false)
    }

    /// Try to produce and apply a fix for one file. Returns the applied
    /// code, or None when this file should be skipped this round.
    async fn try_fix_file(&mut self, path: &str, round: usize) -> anyhow::Result<Option<String>> {
        let content = match self.sandbox.read_file(path) {
            Ok(content) => content,
            Err(err) => {
                warn!(step = "FIX", path, error = %err, "cannot read candidate file, skipping");
                return Ok(None);
            }
        };

        // Large files get filtered down to the sections the keywords point
        // at; if that yields too little, fall back to a plain prefix.
        let oversized = content.chars().count() > self.settings.max_file_chars;
        let (prompt_content, section_labels) = if oversized {
            match extract_relevant_sections(
                &content,
                &self.keywords,
                self.settings.max_context_chars,
            ) {
                Ok(extracted) if extracted.text.trim().chars().count() >= 100 => {
                    (extracted.text, Some(extracted.sections))
                }
                _ => (
                    clip(&content, self.settings.max_file_chars).to_string(),
                    None,
                ),
            }
        } else {
            (content.clone(), None)
        };

        let prompt = if round == 1 {
            build_fix_prompt(
                &self.issue.problem_statement,
                &prompt_content,
                path,
                &self.repro_output,
                section_labels.as_deref(),
            )
        } else {
            self.ledger.build_retry_prompt(
                &self.issue.problem_statement,
                &prompt_content,
                path,
                &self.repro_output,
            )
        };

        let response = match self.client.complete(REPAIR_SYSTEM, &prompt, 0.2, 8192).await {
            Ok(response) => response,
            Err(err) => {
                warn!(step = "FIX", path, error = %err, "fix generation failed");
                return Ok(None);
            }
        };

        let code = extract_python_code(&response);
        if code.trim().is_empty() {
            warn!(step = "FIX", path, "model response contained no code");
            return Ok(None);
        }
        if let Err(err) = validate_python(&code) {
            warn!(step = "FIX", path, error = %err, "generated code has invalid syntax");
            return Ok(None);
        }
        if code.trim() == prompt_content.trim() {
            info!(step = "FIX", path, "model returned the code unchanged");
            return Ok(None);
        }

        let diff = if oversized {
            create_unified_diff(&prompt_content, &code, path)
        } else {
            create_unified_diff(&content, &code, path)
        };
        if !diff.is_empty() {
            self.patches.push(diff);
        }

        self.sandbox.write_file(path, &code)?;
        info!(step = "FIX", path, round, "applied candidate fix");
        Ok(Some(code))
    }

    /// Re-run the reproduction script against the patched code.
    ///
    /// When the output trips the fallback trigger and a fallback test
    /// command is configured, that command's outcome decides instead.
    async fn verify(&mut self) -> anyhow::Result<(bool, String)> {
        let (exit_code, output) = self.sandbox.run_command(
            &format!("python {}", REPRO_SCRIPT),
            self.settings.verify_timeout,
        )?;

        if output.contains(&self.settings.fallback_trigger) {
            if let Some(cmd) = self.settings.fallback_test_command.clone() {
                info!(step = "VERIFY", cmd = %cmd, "running fallback test command");
                let (_, fallback_output) = self
                    .sandbox
                    .run_command(&cmd, self.settings.fallback_timeout)?;
                let passed =
                    !fallback_output.contains("FAILED") && !fallback_output.contains("ERROR");
                return Ok((passed, fallback_output));
            }
        }

        let clean = exit_code == 0 && extract_error_messages(&output).is_empty();
        Ok((clean, output))
    }
}
