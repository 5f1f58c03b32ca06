//! Backstop configuration stored in `config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::atomic::write_atomic;
use crate::io::paths::default_backup_root;

/// Backstop configuration (TOML).
///
/// Intended to be edited by humans. Missing fields fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackstopConfig {
    /// Where snapshots are written. Defaults to `~/.backstop_backups`.
    pub backup_folder: Option<PathBuf>,

    pub remote: RemoteConfig,
}

/// Chat-completion endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RemoteConfig {
    /// Full URL of the chat-completions endpoint.
    pub endpoint: String,

    /// Model identifier sent with every request.
    pub model: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Environment variable checked for the API key before the secret file.
    pub api_key_env: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.mistral.ai/v1/chat/completions".to_string(),
            model: "mistral-large-latest".to_string(),
            timeout_secs: 120,
            api_key_env: "MISTRAL_API_KEY".to_string(),
        }
    }
}

impl BackstopConfig {
    pub fn validate(&self) -> Result<()> {
        if self.remote.endpoint.trim().is_empty() {
            return Err(anyhow!("remote.endpoint must be non-empty"));
        }
        if self.remote.model.trim().is_empty() {
            return Err(anyhow!("remote.model must be non-empty"));
        }
        if self.remote.timeout_secs == 0 {
            return Err(anyhow!("remote.timeout_secs must be > 0"));
        }
        if self.remote.api_key_env.trim().is_empty() {
            return Err(anyhow!("remote.api_key_env must be non-empty"));
        }
        if self
            .backup_folder
            .as_ref()
            .is_some_and(|folder| folder.as_os_str().is_empty())
        {
            return Err(anyhow!("backup_folder must be non-empty when set"));
        }
        Ok(())
    }

    /// Configured backup folder, or `~/.backstop_backups`.
    pub fn backup_root(&self) -> Result<PathBuf> {
        match &self.backup_folder {
            Some(folder) => Ok(folder.clone()),
            None => default_backup_root(),
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `BackstopConfig::default()`.
pub fn load_config(path: &Path) -> Result<BackstopConfig> {
    if !path.exists() {
        let cfg = BackstopConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: BackstopConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &BackstopConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}
