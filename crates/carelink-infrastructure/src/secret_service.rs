//! Secret service implementation.
//!
//! Reads the remote assistant credential from `secret.json` and caches it.
//! A missing file means "no credential", never an error.

use crate::config_file::{parse_error, read_optional};
use crate::paths::CarelinkPaths;
use carelink_core::config::SecretConfig;
use carelink_core::error::{CarelinkError, Result};
use carelink_core::secret::SecretService;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Service for loading secret configuration.
///
/// The file is read on first access and cached afterwards; call
/// [`SecretServiceImpl::invalidate_cache`] to force a reload.
#[derive(Clone)]
pub struct SecretServiceImpl {
    secrets: Arc<RwLock<Option<SecretConfig>>>,
    path: PathBuf,
}

impl SecretServiceImpl {
    /// Creates a service reading the secret file resolved by `paths`.
    pub fn new(paths: &CarelinkPaths) -> Result<Self> {
        let path = paths
            .secret_file()
            .map_err(|e| CarelinkError::config(format!("Failed to resolve secret path: {}", e)))?;
        Ok(Self::with_path(path))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            secrets: Arc::new(RwLock::new(None)),
            path,
        }
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.secrets.write().unwrap_or_else(|e| e.into_inner());
        *write_lock = None;
    }

    fn read_secret_file(&self) -> Result<SecretConfig> {
        match read_optional(&self.path)? {
            Some(content) => {
                serde_json::from_str(&content).map_err(|e| parse_error("JSON", &self.path, e))
            }
            None => {
                tracing::debug!(path = %self.path.display(), "No secret file, continuing without credential");
                Ok(SecretConfig::default())
            }
        }
    }

    fn load_secrets_internal(&self) -> Result<SecretConfig> {
        {
            let read_lock = self.secrets.read().unwrap_or_else(|e| e.into_inner());
            if let Some(ref cached) = *read_lock {
                return Ok(cached.clone());
            }
        }

        let loaded = self.read_secret_file()?;

        {
            let mut write_lock = self.secrets.write().unwrap_or_else(|e| e.into_inner());
            *write_lock = Some(loaded.clone());
        }

        Ok(loaded)
    }
}

#[async_trait::async_trait]
impl SecretService for SecretServiceImpl {
    async fn load_secrets(&self) -> Result<SecretConfig> {
        self.load_secrets_internal()
    }

    async fn secret_file_exists(&self) -> bool {
        self.path.exists()
    }
}
