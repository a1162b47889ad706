//! Inbound message and the uniform response contract.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A user's chat message plus the context only the local responder uses.
///
/// The remote service only ever sees `text`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundUserMessage {
    pub text: String,
    /// Identifier of the person chatting (e.g. a patient or student code).
    #[serde(default)]
    pub caller_id: Option<String>,
    /// Location inside the portal the message was sent from (e.g. `/paciente/agenda`).
    #[serde(default)]
    pub location: Option<String>,
}

impl OutboundUserMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            caller_id: None,
            location: None,
        }
    }

    pub fn with_caller_id(mut self, caller_id: impl Into<String>) -> Self {
        self.caller_id = Some(caller_id.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// True when the text is empty after trimming.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Which subsystem produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Provenance {
    Remote,
    Local,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Time spent by the path that produced the response.
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    /// Model reported by the remote run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Remote thread the reply was read from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Why the remote path was not used, for local responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

/// The uniform output of every orchestration call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub text: String,
    pub provenance: Provenance,
    pub metadata: ResponseMetadata,
}

impl MessageResponse {
    pub fn remote(text: impl Into<String>, metadata: ResponseMetadata) -> Self {
        Self {
            text: text.into(),
            provenance: Provenance::Remote,
            metadata,
        }
    }

    pub fn local(text: impl Into<String>, metadata: ResponseMetadata) -> Self {
        Self {
            text: text.into(),
            provenance: Provenance::Local,
            metadata,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.provenance == Provenance::Remote
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
