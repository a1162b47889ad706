//! Remote conversation domain model: threads, runs and thread messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a server-side conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadHandle(String);

impl ThreadHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a run as reported by the remote service.
///
/// `Queued`, `InProgress` and `Cancelling` are transient. `Completed` is the
/// only successful terminal status. `RequiresAction` asks the caller to
/// submit tool outputs, which this client never does, so it is treated as a
/// terminal failure together with `Failed`, `Cancelled`, `Expired` and
/// `Incomplete`. Unrecognised statuses deserialize to `Unknown` and keep the
/// poll loop going until its own bounds stop it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Completed,
    Failed,
    Cancelled,
    Expired,
    Incomplete,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed
                | Self::RequiresAction
                | Self::Failed
                | Self::Cancelled
                | Self::Expired
                | Self::Incomplete
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// One invocation of the remote assistant against a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunJob {
    pub id: String,
    pub thread: ThreadHandle,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    /// Model that served the run, when the service reports it.
    pub model: Option<String>,
    /// Error message attached by the service to a failed run.
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One content block of a thread message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageContent {
    Text(String),
    /// Any non-text block (images, files...). Holds the wire type name.
    Unsupported(String),
}

/// A message stored in a remote thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: Vec<MessageContent>,
    /// Run that wrote the message; `None` for user turns.
    #[serde(default)]
    pub run_id: Option<String>,
}

impl ThreadMessage {
    /// Joins the text blocks of this message.
    ///
    /// Returns `None` when the message carries no text block at all.
    pub fn plain_text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|block| match block {
                MessageContent::Text(text) => Some(text.as_str()),
                MessageContent::Unsupported(_) => None,
            })
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }
}

/// Minimal description of the configured remote assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantInfo {
    pub id: String,
    pub name: Option<String>,
    pub model: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_run_status_terminal_classification() {
        assert!(!RunStatus::Queued.is_terminal());
        assert!(!RunStatus::InProgress.is_terminal());
        assert!(!RunStatus::Cancelling.is_terminal());
        assert!(!RunStatus::Unknown.is_terminal());

        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Completed.is_success());
        for status in [
            RunStatus::Failed,
            RunStatus::Cancelled,
            RunStatus::Expired,
            RunStatus::RequiresAction,
            RunStatus::Incomplete,
        ] {
            assert!(status.is_terminal(), "{status} should be terminal");
            assert!(!status.is_success(), "{status} should not be a success");
        }
    }

    #[test]
    fn test_run_status_wire_names() {
        assert_eq!(RunStatus::InProgress.to_string(), "in_progress");
        assert_eq!(RunStatus::from_str("expired").unwrap(), RunStatus::Expired);

        let parsed: RunStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(parsed, RunStatus::InProgress);

        let unknown: RunStatus = serde_json::from_str("\"paused_for_review\"").unwrap();
        assert_eq!(unknown, RunStatus::Unknown);
    }

    #[test]
    fn test_plain_text_skips_unsupported_blocks() {
        let message = ThreadMessage {
            id: "msg_1".into(),
            role: MessageRole::Assistant,
            content: vec![
                MessageContent::Unsupported("image_file".into()),
                MessageContent::Text("first".into()),
                MessageContent::Text("second".into()),
            ],
            run_id: Some("run_1".into()),
        };
        assert_eq!(message.plain_text().as_deref(), Some("first\nsecond"));

        let image_only = ThreadMessage {
            content: vec![MessageContent::Unsupported("image_file".into())],
            ..message
        };
        assert_eq!(image_only.plain_text(), None);
    }
}
