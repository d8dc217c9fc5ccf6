//! Configuration: persisted credentials and per-run settings.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Persisted user configuration (`~/.config/mend/config.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

fn config_path() -> anyhow::Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(config_dir.join("mend").join("config.json"))
}

impl Config {
    /// Load the config file, or defaults when it doesn't exist.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config at {}: {}", path.display(), e))
    }

    /// Write the config atomically, with owner-only permissions on the
    /// directory since it holds an API key.
    pub fn save(&self) -> anyhow::Result<()> {
        let path = config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(parent, fs::Permissions::from_mode(0o700))?;
            }
        }

        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Resolve the API key: environment variables win over the config file.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var("MEND_API_KEY")
            .ok()
            .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
            .filter(|k| !k.is_empty())
            .or_else(|| self.api_key.clone())
    }
}

/// Tunables for a single repair run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Fix-and-verify rounds before giving up.
    pub max_attempts: usize,
    /// Timeout for the reproduction script.
    pub repro_timeout: Duration,
    /// Timeout for each verification re-run.
    pub verify_timeout: Duration,
    /// Timeout for the fallback test command.
    pub fallback_timeout: Duration,
    /// Files larger than this are filtered to relevant sections.
    pub max_file_chars: usize,
    /// Character budget for extracted context.
    pub max_context_chars: usize,
    /// Test command to run when verification cannot import the repaired
    /// module directly. None disables the fallback.
    pub fallback_test_command: Option<String>,
    /// Substring of verification output that triggers the fallback command.
    pub fallback_trigger: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            repro_timeout: Duration::from_secs(30),
            verify_timeout: Duration::from_secs(30),
            fallback_timeout: Duration::from_secs(60),
            max_file_chars: 25_000,
            max_context_chars: 20_000,
            fallback_test_command: None,
            fallback_trigger: "ImportError: cannot import name".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = RunSettings::default();
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.max_file_chars, 25_000);
        assert_eq!(settings.max_context_chars, 20_000);
        assert!(settings.fallback_test_command.is_none());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = Config {
            api_key: Some("sk-test".to_string()),
            model: Some("some/model".to_string()),
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.api_key.as_deref(), Some("sk-test"));
        assert_eq!(back.model.as_deref(), Some("some/model"));
    }

    #[test]
    fn test_missing_fields_deserialize_as_none() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert!(config.api_key.is_none());
        assert!(config.model.is_none());
    }
}
