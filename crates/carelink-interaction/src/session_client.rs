//! Remote Session Client: drives one conversation thread through the
//! thread → message → run → poll → fetch lifecycle.
//!
//! The client owns at most one live thread handle. Creation is single-flight:
//! concurrent callers of [`RemoteSessionClient::ensure_thread`] await the same
//! in-flight creation instead of each creating a thread. No call is retried
//! here; retry policy belongs to the orchestrator.

use carelink_core::config::{AssistantConfig, DEFAULT_TIMEOUT};
use carelink_core::conversation::{
    AssistantsTransport, MessageRole, RunJob, ThreadHandle, ThreadMessage,
};
use carelink_core::error::{CarelinkError, Result};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// How many recent messages are inspected when looking for the reply.
const MESSAGE_FETCH_LIMIT: u32 = 20;

type ThreadCreation = Shared<BoxFuture<'static, Result<ThreadHandle>>>;

enum SlotState {
    Empty,
    Creating(ThreadCreation),
    Ready(ThreadHandle),
}

/// Thread handle slot.
///
/// `generation` changes every time the slot leaves the `Creating` state or
/// is reset, so a creation that finishes after a reset cannot overwrite the
/// newer state.
struct ThreadSlot {
    state: SlotState,
    generation: u64,
}

impl ThreadSlot {
    /// Stores the outcome of the creation started at `generation`.
    fn settle(&mut self, generation: u64, result: &Result<ThreadHandle>) {
        if self.generation != generation || !matches!(self.state, SlotState::Creating(_)) {
            return;
        }
        self.generation += 1;
        self.state = match result {
            Ok(handle) => {
                tracing::debug!(thread_id = %handle, "Remote thread ready");
                SlotState::Ready(handle.clone())
            }
            Err(e) => {
                tracing::debug!(error = %e, "Remote thread creation failed");
                SlotState::Empty
            }
        };
    }
}

fn lock(slot: &Mutex<ThreadSlot>) -> MutexGuard<'_, ThreadSlot> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct RemoteSessionClient {
    transport: Arc<dyn AssistantsTransport>,
    slot: Arc<Mutex<ThreadSlot>>,
    poll_interval: Duration,
    max_poll_iterations: u32,
    creation_timeout: Duration,
}

impl RemoteSessionClient {
    pub fn new(
        transport: Arc<dyn AssistantsTransport>,
        poll_interval: Duration,
        max_poll_iterations: u32,
    ) -> Self {
        Self {
            transport,
            slot: Arc::new(Mutex::new(ThreadSlot {
                state: SlotState::Empty,
                generation: 0,
            })),
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            max_poll_iterations: max_poll_iterations.max(1),
            creation_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates a client using the poll settings and timeout of `config`.
    pub fn from_config(transport: Arc<dyn AssistantsTransport>, config: &AssistantConfig) -> Self {
        Self::new(
            transport,
            config.poll_interval(),
            config.max_poll_iterations(),
        )
        .with_creation_timeout(config.timeout())
    }

    /// Bounds a single thread creation, whether or not anyone still awaits it.
    pub fn with_creation_timeout(mut self, timeout: Duration) -> Self {
        self.creation_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    fn lock_slot(&self) -> MutexGuard<'_, ThreadSlot> {
        lock(&self.slot)
    }

    /// Returns the live thread handle, if one has been created.
    pub fn current_thread(&self) -> Option<ThreadHandle> {
        match &self.lock_slot().state {
            SlotState::Ready(handle) => Some(handle.clone()),
            SlotState::Empty | SlotState::Creating(_) => None,
        }
    }

    /// Returns the current thread, creating one if none exists.
    ///
    /// The creation runs on its own task and settles the slot itself, so a
    /// caller dropped at its deadline leaves either a ready thread or an
    /// empty slot behind, never a stalled creation.
    pub async fn ensure_thread(&self) -> Result<ThreadHandle> {
        let creation = {
            let mut slot = self.lock_slot();
            let in_flight = match &slot.state {
                SlotState::Ready(handle) => return Ok(handle.clone()),
                SlotState::Creating(creation) if !matches!(creation.peek(), Some(Err(_))) => {
                    Some(creation.clone())
                }
                SlotState::Creating(_) | SlotState::Empty => None,
            };
            match in_flight {
                Some(creation) => creation,
                None => {
                    slot.generation += 1;
                    let creation = self.spawn_creation(slot.generation);
                    slot.state = SlotState::Creating(creation.clone());
                    creation
                }
            }
        };

        creation.await
    }

    fn spawn_creation(&self, generation: u64) -> ThreadCreation {
        let transport = Arc::clone(&self.transport);
        let slot = Arc::clone(&self.slot);
        let limit = self.creation_timeout;
        tracing::debug!("Creating remote conversation thread");

        let task = tokio::spawn(async move {
            let result = tokio::time::timeout(limit, transport.create_thread())
                .await
                .unwrap_or_else(|_| Err(CarelinkError::remote_timeout(limit)));
            lock(&slot).settle(generation, &result);
            result
        });

        async move {
            task.await.unwrap_or_else(|e| {
                Err(CarelinkError::internal(format!(
                    "thread creation task failed: {e}"
                )))
            })
        }
        .boxed()
        .shared()
    }

    /// Discards the current thread handle. The next `ensure_thread` creates a
    /// new thread. No network effect.
    pub fn reset_thread(&self) {
        let mut slot = self.lock_slot();
        slot.state = SlotState::Empty;
        slot.generation += 1;
    }

    /// Appends `text` as a user turn.
    pub async fn post_message(&self, thread: &ThreadHandle, text: &str) -> Result<()> {
        self.transport.create_message(thread, text).await
    }

    /// Starts a run against the thread.
    pub async fn trigger_run(&self, thread: &ThreadHandle) -> Result<RunJob> {
        let run = self.transport.create_run(thread).await?;
        tracing::debug!(thread_id = %thread, run_id = %run.id, status = %run.status, "Run triggered");
        Ok(run)
    }

    /// Polls the run every poll interval until it is terminal.
    ///
    /// Fails with `RemoteTimeout` when `deadline` passes or the iteration cap
    /// is hit first, and with `RemoteRunFailed` on a terminal failure status.
    /// The iteration cap bounds the loop even if the clock misbehaves.
    pub async fn poll_run(
        &self,
        thread: &ThreadHandle,
        run_id: &str,
        deadline: Instant,
    ) -> Result<RunJob> {
        let started = Instant::now();

        for iteration in 1..=self.max_poll_iterations {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
            if Instant::now() >= deadline {
                break;
            }

            let run = self.transport.retrieve_run(thread, run_id).await?;
            tracing::debug!(run_id, iteration, status = %run.status, "Polled run");

            if run.status.is_success() {
                return Ok(run);
            }
            if run.status.is_terminal() {
                return Err(CarelinkError::run_failed(run.status, run.last_error));
            }
        }

        Err(CarelinkError::remote_timeout(started.elapsed()))
    }

    /// Returns the text of the assistant reply written by `run_id`.
    ///
    /// Messages tagged with a run only match that run, so a reused thread
    /// never hands back the previous turn's reply. When the service tags no
    /// assistant message at all, the newest one is taken.
    pub async fn fetch_latest_assistant_message(
        &self,
        thread: &ThreadHandle,
        run_id: &str,
    ) -> Result<String> {
        let messages = self
            .transport
            .list_messages(thread, MESSAGE_FETCH_LIMIT)
            .await?;

        let assistant: Vec<ThreadMessage> = messages
            .into_iter()
            .filter(|message| message.role == MessageRole::Assistant)
            .collect();
        let tagged = assistant.iter().any(|message| message.run_id.is_some());

        let latest = assistant
            .into_iter()
            .find(|message| !tagged || message.run_id.as_deref() == Some(run_id))
            .ok_or_else(|| {
                CarelinkError::malformed(format!("run {run_id} left no assistant message"))
            })?;

        latest.plain_text().ok_or_else(|| {
            CarelinkError::malformed(format!(
                "assistant message {} has no text content",
                latest.id
            ))
        })
    }

    /// Requests cancellation of a run. Best effort: callers ignore failures.
    pub async fn cancel_run(&self, thread: &ThreadHandle, run_id: &str) -> Result<()> {
        self.transport.cancel_run(thread, run_id).await
    }
}
