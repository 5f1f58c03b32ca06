//! API key lookup and storage.
//!
//! The [`CredentialSource`] trait keeps the orchestrator free of prompting and
//! storage concerns. Tests use fixed sources instead of env vars or files.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::io::atomic::write_atomic;

/// An API key. `Debug` output never shows the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Source of the API credential.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Return the credential, or `None` when the user has not provided one.
    async fn credential(&self) -> Result<Option<Credential>>;
}

/// On-disk secret file (`secret.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretFile {
    pub api_key: Option<String>,
}

/// Env var first, then the secret file next to the config.
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub env_var: String,
    pub secret_path: PathBuf,
}

impl StoredCredentials {
    pub fn new(env_var: impl Into<String>, secret_path: impl Into<PathBuf>) -> Self {
        Self {
            env_var: env_var.into(),
            secret_path: secret_path.into(),
        }
    }

    fn lookup(&self) -> Result<Option<Credential>> {
        if let Some(key) = env::var(&self.env_var)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
        {
            debug!(env_var = %self.env_var, "credential from environment");
            return Ok(Some(Credential::new(key)));
        }
        let secret = load_secret(&self.secret_path)?;
        let key = secret
            .api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        if key.is_some() {
            debug!(path = %self.secret_path.display(), "credential from secret file");
        }
        Ok(key.map(Credential::new))
    }
}

#[async_trait]
impl CredentialSource for StoredCredentials {
    async fn credential(&self) -> Result<Option<Credential>> {
        self.lookup()
    }
}

/// Load the secret file. A missing file is an empty secret.
pub fn load_secret(path: &Path) -> Result<SecretFile> {
    if !path.exists() {
        return Ok(SecretFile::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// Persist `key` to the secret file, replacing any previous key.
pub fn store_secret(path: &Path, key: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("API key must be non-empty"));
    }
    let secret = SecretFile {
        api_key: Some(key.to_string()),
    };
    let mut buf = toml::to_string_pretty(&secret).context("serialize secret toml")?;
    buf.push('\n');
    write_atomic(path, &buf)?;
    restrict_permissions(path)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("restrict permissions {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNSET_VAR: &str = "BACKSTOP_TEST_CREDENTIAL_NEVER_SET";

    #[test]
    fn debug_output_is_redacted() {
        let credential = Credential::new("sk-very-secret");
        assert_eq!(format!("{credential:?}"), "Credential(<redacted>)");
        assert_eq!(credential.expose(), "sk-very-secret");
    }

    #[tokio::test]
    async fn missing_secret_file_means_absent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = StoredCredentials::new(UNSET_VAR, temp.path().join("secret.toml"));
        assert_eq!(source.credential().await.expect("lookup"), None);
    }

    #[tokio::test]
    async fn stored_secret_is_returned() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("secret.toml");
        store_secret(&path, "  sk-123 \n").expect("store");

        let source = StoredCredentials::new(UNSET_VAR, &path);
        let credential = source.credential().await.expect("lookup");
        assert_eq!(credential, Some(Credential::new("sk-123")));
    }

    #[test]
    fn empty_key_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = store_secret(&temp.path().join("secret.toml"), "   ").expect_err("empty");
        assert!(err.to_string().contains("non-empty"));
    }

    #[tokio::test]
    async fn malformed_secret_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("secret.toml");
        fs::write(&path, "api_key = [").expect("write");

        let source = StoredCredentials::new(UNSET_VAR, &path);
        assert!(source.credential().await.is_err());
    }
}
