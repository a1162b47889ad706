//! Trait for the wire-level thread protocol.
//!
//! `carelink-interaction` provides the HTTP implementation. Each method maps
//! to exactly one remote request and never retries.

use super::model::{AssistantInfo, RunJob, ThreadHandle, ThreadMessage};
use crate::error::Result;

#[async_trait::async_trait]
pub trait AssistantsTransport: Send + Sync {
    /// `POST threads`
    async fn create_thread(&self) -> Result<ThreadHandle>;

    /// `DELETE threads/{id}`
    async fn delete_thread(&self, thread: &ThreadHandle) -> Result<()>;

    /// `POST threads/{id}/messages` with a user turn.
    async fn create_message(&self, thread: &ThreadHandle, text: &str) -> Result<()>;

    /// `POST threads/{id}/runs` against the configured assistant.
    async fn create_run(&self, thread: &ThreadHandle) -> Result<RunJob>;

    /// `GET threads/{id}/runs/{run_id}`
    async fn retrieve_run(&self, thread: &ThreadHandle, run_id: &str) -> Result<RunJob>;

    /// `POST threads/{id}/runs/{run_id}/cancel`
    async fn cancel_run(&self, thread: &ThreadHandle, run_id: &str) -> Result<()>;

    /// `GET threads/{id}/messages`, newest first.
    async fn list_messages(&self, thread: &ThreadHandle, limit: u32)
    -> Result<Vec<ThreadMessage>>;

    /// `GET assistants/{assistant_id}`. Side-effect free.
    async fn retrieve_assistant(&self) -> Result<AssistantInfo>;
}
