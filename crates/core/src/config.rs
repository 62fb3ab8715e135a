//! Application configuration.

use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Directory under the platform config dir holding `config.json`.
pub const CONFIG_DIR: &str = "roster";
/// Prefix for environment overrides, e.g. `ROSTER_UPSTREAM_URL`.
pub const ENV_PREFIX: &str = "ROSTER";

/// Runtime settings for the synchroniser and its collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the persistent cache.
    pub cache_root: PathBuf,
    /// Base URL of the upstream game API.
    pub upstream_url: String,
    /// Minimum pause between two upstream calls.
    pub request_delay_ms: u64,
    /// Upper bound for a single upstream call; zero disables the limit.
    pub request_timeout_ms: u64,
    /// Snapshot schema generation. Bumping it discards older snapshots.
    pub cache_version: u32,
    /// Refresh period for watch mode; zero disables polling.
    pub poll_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_root: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(CONFIG_DIR),
            upstream_url: "http://127.0.0.1:8080/api".to_string(),
            request_delay_ms: 250,
            request_timeout_ms: 15_000,
            cache_version: 1,
            poll_interval_secs: 0,
        }
    }
}

impl AppConfig {
    /// Load defaults, then `config.json`, then `ROSTER_*` environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Same as [`AppConfig::load`] with an explicit config file.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = config::Config::builder()
            .add_source(config::File::from(path.clone()).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("failed to read configuration from {}", path.display()))?;
        settings
            .try_deserialize()
            .context("failed to parse configuration")
    }

    /// Delay enforced between upstream calls.
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Per-call timeout, if enabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    /// Polling period, if enabled.
    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_secs > 0).then(|| Duration::from_secs(self.poll_interval_secs))
    }
}

/// Location of the user's `config.json`.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
        .join("config.json")
}

/// Write a default `config.json` when none exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    if path.exists() {
        return Ok(path);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let serialized = serde_json::to_string_pretty(&AppConfig::default())
        .context("failed to serialize default configuration")?;
    fs::write(&path, serialized).with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote default configuration to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_from(dir.path().join("absent.json"))?;
        assert_eq!(config.request_delay_ms, 250);
        assert_eq!(config.cache_version, 1);
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"upstream_url": "https://example.com/api", "request_timeout_ms": 0}"#,
        )?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.upstream_url, "https://example.com/api");
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.request_delay(), Duration::from_millis(250));
        Ok(())
    }
}
