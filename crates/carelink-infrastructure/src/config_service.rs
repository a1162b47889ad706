//! Resolves the `AssistantConfig` from files and environment.
//!
//! Priority for identity fields (credential, assistant id, base URL):
//! 1. `secret.json`
//! 2. Environment variables
//! 3. `config.toml` (base URL only)
//!
//! Timing and cooldown come from `config.toml`, falling back to defaults.
//! A missing credential is not an error: the resulting config simply has no
//! credential and the orchestrator answers locally.

use crate::config_file::{parse_error, read_optional};
use crate::paths::CarelinkPaths;
use crate::secret_service::SecretServiceImpl;
use carelink_core::config::{AssistantConfig, AssistantSettings, SettingsRoot};
use carelink_core::error::{CarelinkError, Result};
use carelink_core::secret::SecretService;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const ENV_API_KEY: &str = "CARELINK_ASSISTANT_API_KEY";
pub const ENV_FALLBACK_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_ASSISTANT_ID: &str = "CARELINK_ASSISTANT_ID";
pub const ENV_BASE_URL: &str = "CARELINK_ASSISTANT_BASE_URL";

/// Environment lookup, injectable for tests.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct AssistantConfigLoader {
    secrets: Arc<dyn SecretService>,
    settings_path: PathBuf,
    env: EnvLookup,
}

impl AssistantConfigLoader {
    /// Creates a loader reading the files resolved by `paths` and the
    /// process environment.
    pub fn new(paths: &CarelinkPaths) -> Result<Self> {
        let secrets = SecretServiceImpl::new(paths)?;
        let settings_path = paths.settings_file().map_err(|e| {
            CarelinkError::config(format!("Failed to resolve settings path: {}", e))
        })?;

        Ok(Self {
            secrets: Arc::new(secrets),
            settings_path,
            env: Arc::new(|key| std::env::var(key).ok()),
        })
    }

    /// Replaces the environment lookup.
    pub fn with_env(mut self, env: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    pub fn with_secret_service(mut self, secrets: Arc<dyn SecretService>) -> Self {
        self.secrets = secrets;
        self
    }

    /// Builds the configuration.
    pub async fn load(&self) -> Result<AssistantConfig> {
        let secret = self.secrets.load_secrets().await?.assistant;
        let settings = self.load_settings()?;

        let api_key = secret
            .as_ref()
            .map(|s| s.api_key.clone())
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.env_value(ENV_API_KEY))
            .or_else(|| self.env_value(ENV_FALLBACK_API_KEY))
            .unwrap_or_default();

        let assistant_id = secret
            .as_ref()
            .and_then(|s| s.assistant_id.clone())
            .filter(|id| !id.trim().is_empty())
            .or_else(|| self.env_value(ENV_ASSISTANT_ID))
            .unwrap_or_default();

        let base_url = secret
            .as_ref()
            .and_then(|s| s.base_url.clone())
            .or_else(|| self.env_value(ENV_BASE_URL))
            .or_else(|| settings.base_url.clone());

        if !api_key.is_empty() && assistant_id.is_empty() {
            return Err(CarelinkError::config(format!(
                "A credential is configured but no assistant id; set assistant.assistant_id in secret.json or {}",
                ENV_ASSISTANT_ID
            )));
        }

        let mut config = AssistantConfig::new(assistant_id, api_key)
            .with_cooldown(settings.cooldown_policy());
        if let Some(base_url) = base_url {
            config = config.with_base_url(base_url);
        }
        if let Some(secs) = settings.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(millis) = settings.poll_interval_ms {
            config = config.with_poll_interval(Duration::from_millis(millis));
        }
        if let Some(cancel) = settings.cancel_on_timeout {
            config = config.with_cancel_on_timeout(cancel);
        }

        tracing::debug!(config = ?config, "Resolved assistant configuration");
        Ok(config)
    }

    /// Reads `config.toml`; a missing or blank file yields the defaults.
    fn load_settings(&self) -> Result<AssistantSettings> {
        let Some(content) = read_optional(&self.settings_path)? else {
            return Ok(AssistantSettings::default());
        };
        let root: SettingsRoot =
            toml::from_str(&content).map_err(|e| parse_error("TOML", &self.settings_path, e))?;
        Ok(root.assistant)
    }

    fn env_value(&self, key: &str) -> Option<String> {
        (self.env)(key).filter(|value| !value.trim().is_empty())
    }
}
