//! Error types for CareLink.

use crate::conversation::RunStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire CareLink workspace.
///
/// The four `Remote*` variants form the failure taxonomy of the remote
/// assistant path. They never reach the caller of the orchestrator: each of
/// them is mapped to the local fallback. The remaining variants cover
/// configuration loading and the local responder.
///
/// The type is `Clone` so that a single in-flight thread creation can be
/// shared between concurrent callers.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum CarelinkError {
    /// Connection, authentication or non-success response at a setup step
    #[error("Remote assistant unavailable: {message}")]
    RemoteUnavailable {
        status_code: Option<u16>,
        message: String,
    },

    /// Deadline exceeded before the run reached a terminal status
    #[error("Remote assistant timed out after {elapsed_ms} ms")]
    RemoteTimeout { elapsed_ms: u64 },

    /// Run reached a terminal failure status
    #[error("Remote run ended with status '{status}'")]
    RemoteRunFailed {
        status: RunStatus,
        detail: Option<String>,
    },

    /// Response shape unusable
    #[error("Malformed remote response: {0}")]
    RemoteMalformed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// The local responder could not produce a reply
    #[error("Local responder error: {0}")]
    Responder(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CarelinkError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a RemoteUnavailable error without an HTTP status
    pub fn remote_unavailable(message: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            status_code: None,
            message: message.into(),
        }
    }

    /// Creates a RemoteUnavailable error carrying the HTTP status
    pub fn remote_status(status_code: u16, message: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            status_code: Some(status_code),
            message: message.into(),
        }
    }

    pub fn remote_timeout(elapsed: std::time::Duration) -> Self {
        Self::RemoteTimeout {
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn run_failed(status: RunStatus, detail: Option<String>) -> Self {
        Self::RemoteRunFailed { status, detail }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::RemoteMalformed(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn responder(message: impl Into<String>) -> Self {
        Self::Responder(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this error belongs to the remote assistant path
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnavailable { .. }
                | Self::RemoteTimeout { .. }
                | Self::RemoteRunFailed { .. }
                | Self::RemoteMalformed(_)
        )
    }

    /// Check if this is a RemoteTimeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RemoteTimeout { .. })
    }

    /// Check if this is a config error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Short, stable label for the failure kind.
    ///
    /// Used as the `fallback_reason` of local responses and in log fields,
    /// so it never contains remote payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RemoteUnavailable { .. } => "remote_unavailable",
            Self::RemoteTimeout { .. } => "remote_timeout",
            Self::RemoteRunFailed { .. } => "remote_run_failed",
            Self::RemoteMalformed(_) => "remote_malformed",
            Self::Config(_) => "config",
            Self::Io { .. } => "io",
            Self::Serialization { .. } => "serialization",
            Self::Responder(_) => "responder",
            Self::Internal(_) => "internal",
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for CarelinkError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for CarelinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for CarelinkError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// Conversion from anyhow::Error, used by responders built on anyhow
impl From<anyhow::Error> for CarelinkError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, CarelinkError>`.
pub type Result<T> = std::result::Result<T, CarelinkError>;
