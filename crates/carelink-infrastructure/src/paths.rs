//! Unified path management for CareLink configuration files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/carelink/          # Config directory (platform config dir)
//! ├── config.toml              # Assistant tuning (timeouts, cooldown)
//! └── secret.json              # Remote assistant credential
//! ```

use carelink_core::config::{AssistantSecret, SecretConfig};
use std::path::{Path, PathBuf};
use thiserror::Error;

const APP_DIR: &str = "carelink";
const SETTINGS_FILE: &str = "config.toml";
const SECRET_FILE: &str = "secret.json";

/// Errors that can occur during path resolution.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("Cannot find configuration directory")]
    ConfigDirNotFound,
}

/// Resolves CareLink file locations.
///
/// With a base directory (tests, `--config-dir`) every file lives directly
/// under it; otherwise the platform config directory is used.
#[derive(Debug, Clone, Default)]
pub struct CarelinkPaths {
    base: Option<PathBuf>,
}

impl CarelinkPaths {
    pub fn new(base: Option<&Path>) -> Self {
        Self {
            base: base.map(Path::to_path_buf),
        }
    }

    /// Returns the CareLink configuration directory.
    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        match &self.base {
            Some(base) => Ok(base.clone()),
            None => dirs::config_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or(PathError::ConfigDirNotFound),
        }
    }

    /// Returns the path to `config.toml`.
    pub fn settings_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join(SETTINGS_FILE))
    }

    /// Returns the path to `secret.json`.
    ///
    /// # Security Note
    ///
    /// Ensure this file has appropriate permissions (e.g., 600) to prevent
    /// unauthorized access.
    pub fn secret_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join(SECRET_FILE))
    }

    /// Ensures the secret file exists, creating an empty template if it doesn't.
    ///
    /// On Unix the file is created with mode 600.
    pub fn ensure_secret_file(&self) -> Result<PathBuf, std::io::Error> {
        let secret_path = self
            .secret_file()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()))?;

        if secret_path.exists() {
            return Ok(secret_path);
        }

        if let Some(parent) = secret_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = SecretConfig {
            assistant: Some(AssistantSecret {
                api_key: String::new(),
                assistant_id: Some(String::new()),
                base_url: None,
            }),
        };
        let template_json = serde_json::to_string_pretty(&template).map_err(std::io::Error::other)?;

        std::fs::write(&secret_path, template_json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&secret_path, permissions)?;
        }

        Ok(secret_path)
    }
}
