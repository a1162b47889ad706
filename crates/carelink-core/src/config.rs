//! Assistant configuration and the on-disk shapes it is loaded from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Extra poll iterations allowed on top of `timeout / poll_interval`.
const POLL_ITERATION_SLACK: u32 = 2;

/// Opt-in policy that skips the remote path after repeated failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    /// Consecutive remote failures before the cooldown starts.
    pub failure_threshold: u32,
    /// How long the remote path is skipped once the threshold is reached.
    pub cooldown: Duration,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
        }
    }
}

/// Immutable configuration of the hybrid assistant.
///
/// Built once (usually by the infrastructure config loader) and handed to
/// the orchestrator, which never mutates it.
#[derive(Clone, PartialEq, Eq)]
pub struct AssistantConfig {
    assistant_id: String,
    api_key: String,
    base_url: String,
    timeout: Duration,
    poll_interval: Duration,
    cancel_on_timeout: bool,
    cooldown: Option<CooldownPolicy>,
}

impl AssistantConfig {
    /// Creates a configuration with default timing and the given identity.
    ///
    /// An empty `api_key` is valid: it means "no credential configured" and
    /// makes every call go to the local responder.
    pub fn new(assistant_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancel_on_timeout: true,
            cooldown: None,
        }
    }

    /// A configuration without credential (local responses only).
    pub fn local_only() -> Self {
        Self::new("", "")
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the poll interval. Zero is raised to one millisecond.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_cancel_on_timeout(mut self, cancel_on_timeout: bool) -> Self {
        self.cancel_on_timeout = cancel_on_timeout;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Option<CooldownPolicy>) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn cancel_on_timeout(&self) -> bool {
        self.cancel_on_timeout
    }

    pub fn cooldown(&self) -> Option<CooldownPolicy> {
        self.cooldown
    }

    /// True when a non-blank credential is configured.
    pub fn has_credential(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Hard cap on poll iterations, independent of clock readings.
    pub fn max_poll_iterations(&self) -> u32 {
        let interval = self.poll_interval.as_millis().max(1);
        let rounds = self.timeout.as_millis().div_ceil(interval);
        u32::try_from(rounds)
            .unwrap_or(u32::MAX)
            .saturating_add(POLL_ITERATION_SLACK)
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self::local_only()
    }
}

impl fmt::Debug for AssistantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistantConfig")
            .field("assistant_id", &self.assistant_id)
            .field(
                "api_key",
                &if self.has_credential() { "<redacted>" } else { "<empty>" },
            )
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .field("cancel_on_timeout", &self.cancel_on_timeout)
            .field("cooldown", &self.cooldown)
            .finish()
    }
}

// ============================================================================
// secret.json
// ============================================================================

/// Root structure of `secret.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretConfig {
    #[serde(default)]
    pub assistant: Option<AssistantSecret>,
}

/// Remote assistant credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantSecret {
    pub api_key: String,
    #[serde(default)]
    pub assistant_id: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

// ============================================================================
// config.toml
// ============================================================================

/// Root structure of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsRoot {
    #[serde(default)]
    pub assistant: AssistantSettings,
}

/// Non-secret tuning for the assistant, all optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantSettings {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub cancel_on_timeout: Option<bool>,
    #[serde(default)]
    pub cooldown_failure_threshold: Option<u32>,
    #[serde(default)]
    pub cooldown_secs: Option<u64>,
}

impl AssistantSettings {
    /// Cooldown policy described by these settings, if any field is set.
    pub fn cooldown_policy(&self) -> Option<CooldownPolicy> {
        if self.cooldown_failure_threshold.is_none() && self.cooldown_secs.is_none() {
            return None;
        }
        let default = CooldownPolicy::default();
        Some(CooldownPolicy {
            failure_threshold: self
                .cooldown_failure_threshold
                .unwrap_or(default.failure_threshold)
                .max(1),
            cooldown: self
                .cooldown_secs
                .map(Duration::from_secs)
                .unwrap_or(default.cooldown),
        })
    }
}
