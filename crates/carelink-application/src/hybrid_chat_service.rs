//! Hybrid Chat Service
//!
//! Routes each chat message to the remote thread-based assistant or to the
//! local deterministic responder, and always returns exactly one
//! [`MessageResponse`] tagged with its provenance.
//!
//! Per call the service walks a small state machine:
//!
//! ```text
//! START ─► TRY_REMOTE ─► REMOTE_OK ───────────────────► DONE
//!   │           └──────► REMOTE_FAILED ─► LOCAL_FALLBACK ─► DONE
//!   └─ (no credential / cooldown / empty input) ─► LOCAL_FALLBACK or DONE
//! ```
//!
//! The whole remote sequence (ensure thread, post, trigger, poll, fetch) runs
//! under one deadline equal to the configured timeout. Every remote failure
//! is caught here and turned into a local response; nothing is retried
//! within a call.

use crate::remote_health::RemoteHealth;
use carelink_core::config::AssistantConfig;
use carelink_core::conversation::{
    APOLOGY_TEXT, AssistantsTransport, LocalResponder, MessageResponse, OutboundUserMessage,
    ResponseMetadata, ThreadHandle, sanitize,
};
use carelink_core::error::{CarelinkError, Result};
use carelink_interaction::{
    AssistantsApiClient, AvailabilityProber, ProbeStrategy, RemoteSessionClient,
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Upper bound for the courtesy cancellation sent after a deadline.
const CANCEL_TIMEOUT: Duration = Duration::from_secs(5);

const REASON_NO_CREDENTIAL: &str = "no_credential";
const REASON_COOLDOWN: &str = "remote_cooldown";
const REASON_EMPTY_INPUT: &str = "empty input";

/// Remote collaborators, present only when a credential is configured.
struct RemoteAssistant {
    session: Arc<RemoteSessionClient>,
    prober: AvailabilityProber,
    /// Serializes post → run → poll on the shared thread so two turns never
    /// interleave.
    turn: tokio::sync::Mutex<()>,
}

/// Successful outcome of the remote path.
struct RemoteReply {
    text: String,
    model: Option<String>,
    thread: ThreadHandle,
}

/// Run whose polling was abandoned at the deadline.
type InFlightRun = Mutex<Option<(ThreadHandle, String)>>;

enum CallState {
    Start,
    TryRemote,
    RemoteOk(RemoteReply, Duration),
    RemoteFailed(CarelinkError),
    LocalFallback(String),
    Done(MessageResponse),
}

impl CallState {
    fn name(&self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::TryRemote => "TRY_REMOTE",
            Self::RemoteOk(..) => "REMOTE_OK",
            Self::RemoteFailed(_) => "REMOTE_FAILED",
            Self::LocalFallback(_) => "LOCAL_FALLBACK",
            Self::Done(_) => "DONE",
        }
    }
}

pub struct HybridChatService {
    config: AssistantConfig,
    remote: Option<RemoteAssistant>,
    responder: Arc<dyn LocalResponder>,
    health: RemoteHealth,
}

impl HybridChatService {
    /// Creates the service over an explicit transport.
    ///
    /// Without a credential in `config` the transport is dropped and never
    /// called.
    pub fn new(
        config: AssistantConfig,
        transport: Arc<dyn AssistantsTransport>,
        responder: Arc<dyn LocalResponder>,
    ) -> Self {
        let remote = config.has_credential().then(|| RemoteAssistant {
            session: Arc::new(RemoteSessionClient::from_config(
                Arc::clone(&transport),
                &config,
            )),
            prober: AvailabilityProber::new(transport, &config),
            turn: tokio::sync::Mutex::new(()),
        });

        Self {
            health: RemoteHealth::new(config.cooldown()),
            config,
            remote,
            responder,
        }
    }

    /// Creates the service with the HTTP transport described by `config`,
    /// or a local-only service when no credential is configured.
    pub fn from_config(config: AssistantConfig, responder: Arc<dyn LocalResponder>) -> Result<Self> {
        if !config.has_credential() {
            tracing::info!("No assistant credential configured, using local responses only");
            return Ok(Self::local_only(config, responder));
        }

        let transport = Arc::new(AssistantsApiClient::from_config(&config)?);
        Ok(Self::new(config, transport, responder))
    }

    /// Creates a service that never calls the remote assistant.
    pub fn local_only(config: AssistantConfig, responder: Arc<dyn LocalResponder>) -> Self {
        Self {
            health: RemoteHealth::new(config.cooldown()),
            config,
            remote: None,
            responder,
        }
    }

    /// Selects how [`Self::is_remote_available`] probes the service.
    pub fn with_probe_strategy(mut self, strategy: ProbeStrategy) -> Self {
        if let Some(remote) = self.remote.take() {
            self.remote = Some(RemoteAssistant {
                prober: remote.prober.with_strategy(strategy),
                ..remote
            });
        }
        self
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// True when the remote path can be attempted at all.
    pub fn remote_enabled(&self) -> bool {
        self.remote.is_some()
    }

    /// Thread the next remote call will reuse, if any.
    pub fn current_thread(&self) -> Option<ThreadHandle> {
        self.remote
            .as_ref()
            .and_then(|remote| remote.session.current_thread())
    }

    /// Starts a new logical conversation on the next remote call.
    pub fn reset_conversation(&self) {
        if let Some(remote) = &self.remote {
            remote.session.reset_thread();
            tracing::debug!("Conversation thread reset");
        }
    }

    /// Probes the remote assistant. Never fails.
    pub async fn is_remote_available(&self) -> bool {
        match &self.remote {
            Some(remote) => remote.prober.probe().await,
            None => false,
        }
    }

    /// Answers one chat message. Always resolves to a response.
    pub async fn send_message(&self, message: OutboundUserMessage) -> MessageResponse {
        let span = tracing::info_span!("send_message", request_id = %Uuid::new_v4());
        self.orchestrate(&message).instrument(span).await
    }

    async fn orchestrate(&self, message: &OutboundUserMessage) -> MessageResponse {
        let mut state = CallState::Start;

        loop {
            tracing::debug!(state = state.name(), "Orchestration step");

            state = match state {
                CallState::Start => {
                    if message.is_blank() {
                        CallState::Done(MessageResponse::local(
                            "",
                            ResponseMetadata {
                                fallback_reason: Some(REASON_EMPTY_INPUT.to_string()),
                                ..Default::default()
                            },
                        ))
                    } else if self.remote.is_none() {
                        CallState::LocalFallback(REASON_NO_CREDENTIAL.to_string())
                    } else if self.health.is_cooling_down() {
                        CallState::LocalFallback(REASON_COOLDOWN.to_string())
                    } else {
                        CallState::TryRemote
                    }
                }
                CallState::TryRemote => {
                    let started = Instant::now();
                    match self.run_remote(&message.text).await {
                        Ok(reply) => CallState::RemoteOk(reply, started.elapsed()),
                        Err(err) => CallState::RemoteFailed(err),
                    }
                }
                CallState::RemoteOk(reply, duration) => {
                    self.health.record_success();
                    tracing::info!(
                        provenance = "remote",
                        duration_ms = duration.as_millis() as u64,
                        thread_id = %reply.thread,
                        "Remote assistant answered"
                    );
                    CallState::Done(MessageResponse::remote(
                        reply.text,
                        ResponseMetadata {
                            duration,
                            model: reply.model,
                            thread_id: Some(reply.thread.to_string()),
                            fallback_reason: None,
                        },
                    ))
                }
                CallState::RemoteFailed(err) => {
                    tracing::warn!(error = %err, kind = err.kind(), "Remote assistant failed, falling back to local responder");
                    if self.health.record_failure() {
                        tracing::warn!("Remote assistant entering cooldown");
                    }
                    CallState::LocalFallback(err.kind().to_string())
                }
                CallState::LocalFallback(reason) => {
                    CallState::Done(self.respond_locally(message, reason).await)
                }
                CallState::Done(response) => return response,
            };
        }
    }

    /// Runs the remote sequence under the configured deadline.
    async fn run_remote(&self, text: &str) -> Result<RemoteReply> {
        let Some(remote) = &self.remote else {
            return Err(CarelinkError::internal("remote path is not configured"));
        };

        let started = Instant::now();
        let deadline = started + self.config.timeout();
        let in_flight: InFlightRun = Mutex::new(None);

        let outcome = tokio::time::timeout_at(
            deadline,
            Self::remote_turn(remote, text, deadline, &in_flight),
        )
        .await
        .unwrap_or_else(|_| Err(CarelinkError::remote_timeout(started.elapsed())));

        let timed_out = matches!(&outcome, Err(err) if err.is_timeout());
        if timed_out && self.config.cancel_on_timeout() {
            let abandoned = in_flight.lock().unwrap_or_else(|e| e.into_inner()).take();
            if let Some((thread, run_id)) = abandoned {
                Self::cancel_detached(Arc::clone(&remote.session), thread, run_id);
            }
        }

        outcome
    }

    async fn remote_turn(
        remote: &RemoteAssistant,
        text: &str,
        deadline: Instant,
        in_flight: &InFlightRun,
    ) -> Result<RemoteReply> {
        let _turn = remote.turn.lock().await;
        let session = &remote.session;

        let thread = session.ensure_thread().await?;
        session.post_message(&thread, text).await?;
        let run = session.trigger_run(&thread).await?;
        *in_flight.lock().unwrap_or_else(|e| e.into_inner()) =
            Some((thread.clone(), run.id.clone()));

        let finished = session.poll_run(&thread, &run.id, deadline).await?;
        *in_flight.lock().unwrap_or_else(|e| e.into_inner()) = None;

        let raw = session
            .fetch_latest_assistant_message(&thread, &run.id)
            .await?;
        let text = sanitize(&raw);
        if text.is_empty() {
            return Err(CarelinkError::malformed("assistant reply is empty after sanitization"));
        }

        Ok(RemoteReply {
            text,
            model: finished.model.or(run.model),
            thread,
        })
    }

    /// Cancels an abandoned run without delaying the fallback.
    fn cancel_detached(session: Arc<RemoteSessionClient>, thread: ThreadHandle, run_id: String) {
        tokio::spawn(async move {
            match tokio::time::timeout(CANCEL_TIMEOUT, session.cancel_run(&thread, &run_id)).await {
                Ok(Ok(())) => tracing::debug!(thread_id = %thread, run_id = %run_id, "Abandoned run cancelled"),
                Ok(Err(e)) => tracing::debug!(run_id = %run_id, error = %e, "Run cancellation failed"),
                Err(_) => tracing::debug!(run_id = %run_id, "Run cancellation timed out"),
            }
        });
    }

    async fn respond_locally(&self, message: &OutboundUserMessage, reason: String) -> MessageResponse {
        let started = Instant::now();

        let generated = AssertUnwindSafe(self.responder.generate(message))
            .catch_unwind()
            .await;

        let text = match generated {
            Ok(Ok(text)) if !text.trim().is_empty() => text,
            Ok(Ok(_)) => {
                tracing::warn!("Local responder returned an empty reply");
                APOLOGY_TEXT.to_string()
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Local responder failed");
                APOLOGY_TEXT.to_string()
            }
            Err(_) => {
                tracing::error!("Local responder panicked");
                APOLOGY_TEXT.to_string()
            }
        };

        let duration = started.elapsed();
        tracing::info!(
            provenance = "local",
            duration_ms = duration.as_millis() as u64,
            reason = %reason,
            "Local responder answered"
        );

        MessageResponse::local(
            text,
            ResponseMetadata {
                duration,
                fallback_reason: Some(reason),
                ..Default::default()
            },
        )
    }
}
