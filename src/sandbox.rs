//! The isolated environment a repair run executes against.
//!
//! [`Sandbox`] is the seam between the repair loop and whatever actually
//! runs the code (a container, a throwaway checkout, a test double).
//! [`LocalSandbox`] executes commands and file I/O against a local working
//! root, which is what the CLI uses.

use std::fs;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Command execution and file I/O inside one isolated environment.
///
/// Relative paths resolve against the environment's working root. A
/// timeout surfaces as a failed command result, not an error.
pub trait Sandbox: Send {
    /// Acquire the environment. Called once before any other operation.
    fn start(&mut self) -> anyhow::Result<()>;

    /// Run a shell command, returning `(exit_code, combined_output)`.
    fn run_command(&mut self, cmd: &str, timeout: Duration) -> anyhow::Result<(i32, String)>;

    /// Write a file under the working root, creating parent directories.
    fn write_file(&mut self, path: &str, content: &str) -> anyhow::Result<()>;

    /// Read a file under the working root.
    fn read_file(&mut self, path: &str) -> anyhow::Result<String>;

    /// List source files under the working root, sorted, capped to
    /// `max_files`, as root-relative paths.
    fn list_files(&mut self, max_files: usize) -> anyhow::Result<Vec<String>>;

    /// Release the environment. Must be safe to call on every exit path.
    fn cleanup(&mut self);
}

/// Directory names never worth listing or searching.
const SKIP_DIRS: &[&str] = &[".git", "__pycache__", "venv", "env", "node_modules"];

/// A sandbox that executes directly against a local directory.
pub struct LocalSandbox {
    root: PathBuf,
    started: bool,
}

impl LocalSandbox {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            started: false,
        }
    }

    /// Resolve a sandbox-relative path, rejecting escapes.
    fn resolve(&self, candidate: &str) -> anyhow::Result<PathBuf> {
        let candidate = Path::new(candidate);
        if candidate.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("Path is empty"));
        }
        if candidate.is_absolute() {
            return Err(anyhow::anyhow!(
                "Absolute paths are not allowed: {}",
                candidate.display()
            ));
        }
        if candidate
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(anyhow::anyhow!(
                "Parent traversal is not allowed: {}",
                candidate.display()
            ));
        }
        Ok(self.root.join(candidate))
    }
}

impl Sandbox for LocalSandbox {
    fn start(&mut self) -> anyhow::Result<()> {
        if !self.root.is_dir() {
            return Err(anyhow::anyhow!(
                "Sandbox root does not exist: {}",
                self.root.display()
            ));
        }
        self.started = true;
        info!(root = %self.root.display(), "sandbox started");
        Ok(())
    }

    fn run_command(&mut self, cmd: &str, timeout: Duration) -> anyhow::Result<(i32, String)> {
        if !self.started {
            return Err(anyhow::anyhow!("Sandbox is not running"));
        }

        debug!(cmd, timeout_secs = timeout.as_secs(), "running command");

        let mut child = Command::new("bash")
            .arg("-c")
            .arg(cmd)
            .current_dir(&self.root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| anyhow::anyhow!("Failed to start command: {}", e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to capture stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to capture stderr"))?;

        // Drain pipes on separate threads so a chatty child can't deadlock
        // against a full pipe buffer while we poll for exit.
        let stdout_handle = thread::spawn(move || {
            let mut buf = Vec::new();
            let mut reader = BufReader::new(stdout);
            let _ = reader.read_to_end(&mut buf);
            buf
        });
        let stderr_handle = thread::spawn(move || {
            let mut buf = Vec::new();
            let mut reader = BufReader::new(stderr);
            let _ = reader.read_to_end(&mut buf);
            buf
        });

        let start = Instant::now();
        let mut timed_out = false;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) => {
                    if start.elapsed() >= timeout {
                        timed_out = true;
                        let _ = child.kill();
                        break child.wait().ok();
                    }
                    thread::sleep(Duration::from_millis(50));
                }
                Err(e) => return Err(anyhow::anyhow!("Failed to wait for command: {}", e)),
            }
        };

        let stdout_bytes = stdout_handle.join().unwrap_or_default();
        let stderr_bytes = stderr_handle.join().unwrap_or_default();

        let mut output = String::from_utf8_lossy(&stdout_bytes).to_string();
        output.push_str(&String::from_utf8_lossy(&stderr_bytes));

        if timed_out {
            output.push_str(&format!(
                "\n[command timed out after {}s]",
                timeout.as_secs()
            ));
            return Ok((-1, output));
        }

        let exit_code = status.and_then(|s| s.code()).unwrap_or(-1);
        Ok((exit_code, output))
    }

    fn write_file(&mut self, path: &str, content: &str) -> anyhow::Result<()> {
        let resolved = self.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", parent.display(), e))?;
        }
        fs::write(&resolved, content)
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", resolved.display(), e))
    }

    fn read_file(&mut self, path: &str) -> anyhow::Result<String> {
        let resolved = self.resolve(path)?;
        fs::read_to_string(&resolved)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", resolved.display(), e))
    }

    fn list_files(&mut self, max_files: usize) -> anyhow::Result<Vec<String>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.root).into_iter().filter_entry(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| !SKIP_DIRS.contains(&name))
                .unwrap_or(true)
        });

        for entry in walker.flatten() {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("py") {
                continue;
            }
            if let Ok(relative) = path.strip_prefix(&self.root) {
                files.push(relative.display().to_string());
            }
        }

        files.sort();
        files.truncate(max_files);
        Ok(files)
    }

    fn cleanup(&mut self) {
        if self.started {
            self.started = false;
            info!(root = %self.root.display(), "sandbox released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox_with_files(files: &[(&str, &str)]) -> (tempfile::TempDir, LocalSandbox) {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        let mut sandbox = LocalSandbox::new(dir.path().to_path_buf());
        sandbox.start().unwrap();
        (dir, sandbox)
    }

    #[test]
    fn test_run_command_combined_output_and_exit_code() {
        let (_dir, mut sandbox) = sandbox_with_files(&[]);
        let (code, output) = sandbox
            .run_command("echo out; echo err >&2; exit 3", Duration::from_secs(5))
            .unwrap();
        assert_eq!(code, 3);
        assert!(output.contains("out"));
        assert!(output.contains("err"));
    }

    #[test]
    fn test_run_command_timeout_surfaces_as_failed_command() {
        let (_dir, mut sandbox) = sandbox_with_files(&[]);
        let (code, output) = sandbox
            .run_command("sleep 5", Duration::from_millis(100))
            .unwrap();
        assert_eq!(code, -1);
        assert!(output.contains("timed out"));
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let (_dir, mut sandbox) = sandbox_with_files(&[]);
        sandbox.write_file("pkg/new_file.py", "x = 1\n").unwrap();
        assert_eq!(sandbox.read_file("pkg/new_file.py").unwrap(), "x = 1\n");
    }

    #[test]
    fn test_path_escapes_are_rejected() {
        let (_dir, mut sandbox) = sandbox_with_files(&[]);
        assert!(sandbox.read_file("../outside.py").is_err());
        assert!(sandbox.write_file("/etc/passwd", "nope").is_err());
    }

    #[test]
    fn test_list_files_filters_and_sorts() {
        let (_dir, mut sandbox) = sandbox_with_files(&[
            ("b.py", ""),
            ("a.py", ""),
            ("readme.md", ""),
            ("__pycache__/cached.py", ""),
            ("venv/lib/thing.py", ""),
        ]);
        let files = sandbox.list_files(10).unwrap();
        assert_eq!(files, vec!["a.py", "b.py"]);
    }

    #[test]
    fn test_list_files_caps_count() {
        let (_dir, mut sandbox) =
            sandbox_with_files(&[("a.py", ""), ("b.py", ""), ("c.py", "")]);
        let files = sandbox.list_files(2).unwrap();
        assert_eq!(files.len(), 2);
    }
}
