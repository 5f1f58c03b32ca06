//! Well-known locations for config, secrets, and backups.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

/// Folder created under the home directory when no backup root is configured.
pub const DEFAULT_BACKUP_DIR_NAME: &str = ".backstop_backups";

const APP_DIR_NAME: &str = "backstop";
const CONFIG_FILE_NAME: &str = "config.toml";
const SECRET_FILE_NAME: &str = "secret.toml";

/// Config and secret file locations.
///
/// The secret file always sits next to the config file so a custom
/// `--config` path keeps both together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_path: PathBuf,
    pub secret_path: PathBuf,
}

impl AppPaths {
    /// Paths derived from an explicit config file location.
    pub fn from_config_path(config_path: impl Into<PathBuf>) -> Self {
        let config_path = config_path.into();
        let secret_path = config_path.with_file_name(SECRET_FILE_NAME);
        Self {
            config_path,
            secret_path,
        }
    }

    /// Paths under the platform config directory (`~/.config/backstop/` on Linux).
    pub fn from_platform() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("cannot determine config directory"))?
            .join(APP_DIR_NAME);
        Ok(Self::from_config_path(dir.join(CONFIG_FILE_NAME)))
    }

    /// Use `explicit` when given, the platform location otherwise.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Ok(Self::from_config_path(path)),
            None => Self::from_platform(),
        }
    }
}

/// `~/.backstop_backups`.
pub fn default_backup_root() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(home.join(DEFAULT_BACKUP_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_sits_next_to_config() {
        let paths = AppPaths::from_config_path("/tmp/custom/settings.toml");
        assert_eq!(paths.config_path, PathBuf::from("/tmp/custom/settings.toml"));
        assert_eq!(paths.secret_path, PathBuf::from("/tmp/custom/secret.toml"));
    }

    #[test]
    fn explicit_path_wins() {
        let paths = AppPaths::resolve(Some(Path::new("/etc/backstop.toml"))).expect("resolve");
        assert_eq!(paths.config_path, PathBuf::from("/etc/backstop.toml"));
    }
}
