//! End-to-end behaviour of the hybrid orchestrator over an in-memory transport.

use async_trait::async_trait;
use carelink_application::HybridChatService;
use carelink_core::config::{AssistantConfig, CooldownPolicy};
use carelink_core::conversation::{
    APOLOGY_TEXT, AssistantInfo, AssistantsTransport, LocalResponder, MessageContent, MessageRole,
    OutboundUserMessage, Provenance, RunJob, RunStatus, ThreadHandle, ThreadMessage,
};
use carelink_core::error::{CarelinkError, Result};
use carelink_interaction::ProbeStrategy;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

const TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Test doubles
// ============================================================================

struct FakeTransport {
    calls: Mutex<Vec<String>>,
    threads_created: AtomicUsize,
    runs_created: AtomicUsize,
    cancels: AtomicUsize,
    thread_delay: Duration,
    fail_threads: AtomicBool,
    hang_next_thread: AtomicBool,
    run_status: Mutex<RunStatus>,
    reply: Mutex<Option<String>>,
    /// Run the assistant reply is attributed to; defaults to the latest run.
    reply_run: Mutex<Option<String>>,
}

impl FakeTransport {
    fn answering(reply: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            threads_created: AtomicUsize::new(0),
            runs_created: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            thread_delay: Duration::ZERO,
            fail_threads: AtomicBool::new(false),
            hang_next_thread: AtomicBool::new(false),
            run_status: Mutex::new(RunStatus::Completed),
            reply: Mutex::new(Some(reply.to_string())),
            reply_run: Mutex::new(None),
        }
    }

    fn with_run_status(self, status: RunStatus) -> Self {
        *self.run_status.lock().unwrap() = status;
        self
    }

    fn with_thread_delay(mut self, delay: Duration) -> Self {
        self.thread_delay = delay;
        self
    }

    fn without_reply(self) -> Self {
        *self.reply.lock().unwrap() = None;
        self
    }

    fn hanging_first_thread(self) -> Self {
        self.hang_next_thread.store(true, Ordering::SeqCst);
        self
    }

    fn failing_threads(self) -> Self {
        self.fail_threads.store(true, Ordering::SeqCst);
        self
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AssistantsTransport for FakeTransport {
    async fn create_thread(&self) -> Result<ThreadHandle> {
        self.record("thread");
        let n = self.threads_created.fetch_add(1, Ordering::SeqCst);
        if self.hang_next_thread.swap(false, Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if !self.thread_delay.is_zero() {
            tokio::time::sleep(self.thread_delay).await;
        }
        if self.fail_threads.load(Ordering::SeqCst) {
            return Err(CarelinkError::remote_status(503, "service unavailable"));
        }
        Ok(ThreadHandle::new(format!("thread_{n}")))
    }

    async fn delete_thread(&self, _thread: &ThreadHandle) -> Result<()> {
        self.record("delete");
        Ok(())
    }

    async fn create_message(&self, _thread: &ThreadHandle, text: &str) -> Result<()> {
        self.record(format!("message:{text}"));
        Ok(())
    }

    async fn create_run(&self, thread: &ThreadHandle) -> Result<RunJob> {
        self.record("run");
        let n = self.runs_created.fetch_add(1, Ordering::SeqCst);
        Ok(RunJob {
            id: format!("run_{n}"),
            thread: thread.clone(),
            status: RunStatus::Queued,
            created_at: Utc::now(),
            model: None,
            last_error: None,
        })
    }

    async fn retrieve_run(&self, thread: &ThreadHandle, run_id: &str) -> Result<RunJob> {
        self.record("poll");
        let status = *self.run_status.lock().unwrap();
        Ok(RunJob {
            id: run_id.to_string(),
            thread: thread.clone(),
            status,
            created_at: Utc::now(),
            model: Some("gpt-4o-mini".into()),
            last_error: (status == RunStatus::Failed).then(|| "server_error".to_string()),
        })
    }

    async fn cancel_run(&self, _thread: &ThreadHandle, _run_id: &str) -> Result<()> {
        self.record("cancel");
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_messages(&self, _thread: &ThreadHandle, _limit: u32) -> Result<Vec<ThreadMessage>> {
        self.record("list");
        let mut messages = Vec::new();
        if let Some(reply) = self.reply.lock().unwrap().clone() {
            let latest_run = self.runs_created.load(Ordering::SeqCst).saturating_sub(1);
            let run_id = self
                .reply_run
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| format!("run_{latest_run}"));
            messages.push(ThreadMessage {
                id: "msg_assistant".into(),
                role: MessageRole::Assistant,
                content: vec![MessageContent::Text(reply)],
                run_id: Some(run_id),
            });
        }
        messages.push(ThreadMessage {
            id: "msg_user".into(),
            role: MessageRole::User,
            content: vec![MessageContent::Text("pergunta".into())],
            run_id: None,
        });
        Ok(messages)
    }

    async fn retrieve_assistant(&self) -> Result<AssistantInfo> {
        self.record("assistant");
        Ok(AssistantInfo {
            id: "asst_test".into(),
            name: None,
            model: Some("gpt-4o-mini".into()),
        })
    }
}

#[derive(Default)]
struct RecordingResponder {
    received: Mutex<Vec<OutboundUserMessage>>,
}

#[async_trait]
impl LocalResponder for RecordingResponder {
    async fn generate(&self, message: &OutboundUserMessage) -> Result<String> {
        self.received.lock().unwrap().push(message.clone());
        Ok(format!("local: {}", message.text))
    }
}

struct FailingResponder;

#[async_trait]
impl LocalResponder for FailingResponder {
    async fn generate(&self, _message: &OutboundUserMessage) -> Result<String> {
        Err(CarelinkError::responder("knowledge base unavailable"))
    }
}

struct PanickingResponder;

#[async_trait]
impl LocalResponder for PanickingResponder {
    async fn generate(&self, _message: &OutboundUserMessage) -> Result<String> {
        panic!("responder bug")
    }
}

fn config() -> AssistantConfig {
    AssistantConfig::new("asst_test", "sk-test")
        .with_timeout(TIMEOUT)
        .with_poll_interval(Duration::from_millis(100))
}

fn build_service(
    config: AssistantConfig,
    transport: &Arc<FakeTransport>,
    responder: &Arc<RecordingResponder>,
) -> HybridChatService {
    HybridChatService::new(config, transport.clone(), responder.clone())
}

// ============================================================================
// Remote path
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_remote_reply_is_sanitized_and_tagged_remote() {
    let transport = Arc::new(FakeTransport::answering(
        "Raciocínio: avaliar histórico\nOrientação/Resposta: Mantenha a dose prescrita.",
    ));
    let responder = Arc::new(RecordingResponder::default());
    let service = build_service(config(), &transport, &responder);

    let response = service
        .send_message(OutboundUserMessage::new("Qual a dose inicial de CBD?"))
        .await;

    assert_eq!(response.provenance, Provenance::Remote);
    assert_eq!(response.text, "Mantenha a dose prescrita.");
    assert_eq!(response.metadata.model.as_deref(), Some("gpt-4o-mini"));
    assert_eq!(response.metadata.thread_id.as_deref(), Some("thread_0"));
    assert!(response.metadata.fallback_reason.is_none());
    assert!(responder.received.lock().unwrap().is_empty());
    assert_eq!(
        transport.calls(),
        vec!["thread", "message:Qual a dose inicial de CBD?", "run", "poll", "list"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_thread_is_reused_until_reset() {
    let transport = Arc::new(FakeTransport::answering("Resposta"));
    let responder = Arc::new(RecordingResponder::default());
    let service = build_service(config(), &transport, &responder);

    assert!(service.current_thread().is_none());
    service.send_message(OutboundUserMessage::new("um")).await;
    service.send_message(OutboundUserMessage::new("dois")).await;
    assert_eq!(transport.threads_created.load(Ordering::SeqCst), 1);
    assert_eq!(service.current_thread(), Some(ThreadHandle::new("thread_0")));

    service.reset_conversation();
    assert!(service.current_thread().is_none());

    let response = service.send_message(OutboundUserMessage::new("três")).await;
    assert_eq!(transport.threads_created.load(Ordering::SeqCst), 2);
    assert_eq!(response.metadata.thread_id.as_deref(), Some("thread_1"));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_turns_do_not_interleave() {
    let transport = Arc::new(FakeTransport::answering("ok"));
    let responder = Arc::new(RecordingResponder::default());
    let service = build_service(config(), &transport, &responder);

    let (first, second) = tokio::join!(
        service.send_message(OutboundUserMessage::new("a")),
        service.send_message(OutboundUserMessage::new("b")),
    );

    assert!(first.is_remote());
    assert!(second.is_remote());
    assert_eq!(transport.threads_created.load(Ordering::SeqCst), 1);

    let turn_events: Vec<String> = transport
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("message:") || call == "run" || call == "list")
        .map(|call| if call.starts_with("message:") { "message".to_string() } else { call })
        .collect();
    assert_eq!(
        turn_events,
        vec!["message", "run", "list", "message", "run", "list"]
    );
}

// ============================================================================
// Fallback path
// ============================================================================

#[tokio::test]
async fn test_missing_credential_never_touches_transport() {
    let transport = Arc::new(FakeTransport::answering("remote"));
    let responder = Arc::new(RecordingResponder::default());
    let service = build_service(AssistantConfig::local_only(), &transport, &responder);

    let response = service
        .send_message(OutboundUserMessage::new("Olá").with_caller_id("PAC-1"))
        .await;

    assert_eq!(response.provenance, Provenance::Local);
    assert_eq!(response.text, "local: Olá");
    assert_eq!(response.metadata.fallback_reason.as_deref(), Some("no_credential"));
    assert!(!service.remote_enabled());
    assert!(!service.is_remote_available().await);
    assert_eq!(transport.total_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_run_falls_back_with_original_message() {
    let transport = Arc::new(FakeTransport::answering("unused").with_run_status(RunStatus::Failed));
    let responder = Arc::new(RecordingResponder::default());
    let service = build_service(config(), &transport, &responder);

    let message = OutboundUserMessage::new("Qual o horário?")
        .with_caller_id("PAC-9")
        .with_location("/paciente/agenda");
    let response = service.send_message(message.clone()).await;

    assert_eq!(response.provenance, Provenance::Local);
    assert_eq!(response.metadata.fallback_reason.as_deref(), Some("remote_run_failed"));
    assert_eq!(responder.received.lock().unwrap().as_slice(), &[message]);
}

#[tokio::test(start_paused = true)]
async fn test_requires_action_is_a_failure() {
    let transport =
        Arc::new(FakeTransport::answering("unused").with_run_status(RunStatus::RequiresAction));
    let responder = Arc::new(RecordingResponder::default());
    let service = build_service(config(), &transport, &responder);

    let response = service.send_message(OutboundUserMessage::new("x")).await;
    assert_eq!(response.provenance, Provenance::Local);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_run_times_out_and_is_cancelled() {
    let transport =
        Arc::new(FakeTransport::answering("late").with_run_status(RunStatus::InProgress));
    let responder = Arc::new(RecordingResponder::default());
    let service = build_service(config(), &transport, &responder);

    let started = Instant::now();
    let response = service.send_message(OutboundUserMessage::new("demora")).await;
    let elapsed = started.elapsed();

    assert_eq!(response.provenance, Provenance::Local);
    assert_eq!(response.metadata.fallback_reason.as_deref(), Some("remote_timeout"));
    assert!(elapsed >= TIMEOUT - Duration::from_millis(100), "{elapsed:?}");
    assert!(elapsed <= TIMEOUT + Duration::from_millis(100), "{elapsed:?}");

    // The cancellation is detached; give it a chance to run.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(transport.cancels.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_on_timeout_can_be_disabled() {
    let transport =
        Arc::new(FakeTransport::answering("late").with_run_status(RunStatus::Queued));
    let responder = Arc::new(RecordingResponder::default());
    let service = build_service(config().with_cancel_on_timeout(false), &transport, &responder);

    let response = service.send_message(OutboundUserMessage::new("demora")).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(response.provenance, Provenance::Local);
    assert_eq!(transport.cancels.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_thread_creation_counts_against_deadline() {
    let transport = Arc::new(
        FakeTransport::answering("never").with_thread_delay(TIMEOUT + Duration::from_secs(1)),
    );
    let responder = Arc::new(RecordingResponder::default());
    let service = build_service(config(), &transport, &responder);

    let started = Instant::now();
    let response = service.send_message(OutboundUserMessage::new("oi")).await;

    assert_eq!(response.provenance, Provenance::Local);
    assert_eq!(response.metadata.fallback_reason.as_deref(), Some("remote_timeout"));
    assert!(started.elapsed() <= TIMEOUT + Duration::from_millis(100));
    // No run was started, so there is nothing to cancel.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(transport.cancels.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_thread_creation_does_not_block_next_call() {
    let transport = Arc::new(FakeTransport::answering("Pronto").hanging_first_thread());
    let responder = Arc::new(RecordingResponder::default());
    let service = build_service(config(), &transport, &responder);

    let first = service.send_message(OutboundUserMessage::new("1")).await;
    assert_eq!(first.provenance, Provenance::Local);
    assert_eq!(first.metadata.fallback_reason.as_deref(), Some("remote_timeout"));

    tokio::time::advance(Duration::from_secs(60)).await;

    let second = service.send_message(OutboundUserMessage::new("2")).await;
    assert_eq!(second.provenance, Provenance::Remote);
    assert_eq!(second.text, "Pronto");
    assert_eq!(transport.threads_created.load(Ordering::SeqCst), 2);
    assert_eq!(second.metadata.thread_id.as_deref(), Some("thread_1"));
}

#[tokio::test(start_paused = true)]
async fn test_thread_creation_error_falls_back() {
    let transport = Arc::new(FakeTransport::answering("unused").failing_threads());
    let responder = Arc::new(RecordingResponder::default());
    let service = build_service(config(), &transport, &responder);

    let response = service.send_message(OutboundUserMessage::new("oi")).await;

    assert_eq!(response.provenance, Provenance::Local);
    assert_eq!(response.metadata.fallback_reason.as_deref(), Some("remote_unavailable"));
    assert!(service.current_thread().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_missing_assistant_message_falls_back() {
    let transport = Arc::new(FakeTransport::answering("unused").without_reply());
    let responder = Arc::new(RecordingResponder::default());
    let service = build_service(config(), &transport, &responder);

    let response = service.send_message(OutboundUserMessage::new("oi")).await;

    assert_eq!(response.provenance, Provenance::Local);
    assert_eq!(response.metadata.fallback_reason.as_deref(), Some("remote_malformed"));
}

#[tokio::test(start_paused = true)]
async fn test_previous_turn_reply_is_not_reused() {
    let transport = Arc::new(FakeTransport::answering("Primeira resposta"));
    let responder = Arc::new(RecordingResponder::default());
    let service = build_service(config(), &transport, &responder);

    let first = service.send_message(OutboundUserMessage::new("1")).await;
    assert_eq!(first.provenance, Provenance::Remote);

    // The second run completes without writing a message of its own.
    *transport.reply_run.lock().unwrap() = Some("run_0".into());
    let second = service.send_message(OutboundUserMessage::new("2")).await;

    assert_eq!(transport.runs_created.load(Ordering::SeqCst), 2);
    assert_eq!(second.provenance, Provenance::Local);
    assert_eq!(second.metadata.fallback_reason.as_deref(), Some("remote_malformed"));
    assert_eq!(second.text, "local: 2");
}

#[tokio::test(start_paused = true)]
async fn test_reply_empty_after_sanitizing_falls_back() {
    let transport = Arc::new(FakeTransport::answering("Orientação/Resposta:   \n"));
    let responder = Arc::new(RecordingResponder::default());
    let service = build_service(config(), &transport, &responder);

    let response = service.send_message(OutboundUserMessage::new("oi")).await;

    assert_eq!(response.provenance, Provenance::Local);
    assert_eq!(response.text, "local: oi");
}

#[tokio::test(start_paused = true)]
async fn test_failure_does_not_disable_later_remote_calls() {
    let transport = Arc::new(FakeTransport::answering("De volta").failing_threads());
    let responder = Arc::new(RecordingResponder::default());
    let service = build_service(config(), &transport, &responder);

    let first = service.send_message(OutboundUserMessage::new("1")).await;
    assert_eq!(first.provenance, Provenance::Local);

    transport.fail_threads.store(false, Ordering::SeqCst);
    let second = service.send_message(OutboundUserMessage::new("2")).await;
    assert_eq!(second.provenance, Provenance::Remote);
    assert_eq!(second.text, "De volta");
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_skips_remote_until_expired() {
    let transport = Arc::new(FakeTransport::answering("ok").failing_threads());
    let responder = Arc::new(RecordingResponder::default());
    let policy = CooldownPolicy {
        failure_threshold: 1,
        cooldown: Duration::from_secs(10),
    };
    let service = build_service(config().with_cooldown(Some(policy)), &transport, &responder);

    let first = service.send_message(OutboundUserMessage::new("1")).await;
    assert_eq!(first.metadata.fallback_reason.as_deref(), Some("remote_unavailable"));

    let second = service.send_message(OutboundUserMessage::new("2")).await;
    assert_eq!(second.metadata.fallback_reason.as_deref(), Some("remote_cooldown"));
    assert_eq!(transport.threads_created.load(Ordering::SeqCst), 1);

    transport.fail_threads.store(false, Ordering::SeqCst);
    tokio::time::advance(Duration::from_secs(11)).await;

    let third = service.send_message(OutboundUserMessage::new("3")).await;
    assert_eq!(third.provenance, Provenance::Remote);
    assert_eq!(transport.threads_created.load(Ordering::SeqCst), 2);
}

// ============================================================================
// Edge cases
// ============================================================================

#[tokio::test]
async fn test_blank_input_is_a_local_no_op() {
    let transport = Arc::new(FakeTransport::answering("remote"));
    let responder = Arc::new(RecordingResponder::default());
    let service = build_service(config(), &transport, &responder);

    let response = service.send_message(OutboundUserMessage::new("   \n")).await;

    assert_eq!(response.provenance, Provenance::Local);
    assert_eq!(response.text, "");
    assert_eq!(response.metadata.fallback_reason.as_deref(), Some("empty input"));
    assert_eq!(transport.total_calls(), 0);
    assert!(responder.received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_responder_error_yields_apology() {
    let service = HybridChatService::local_only(AssistantConfig::local_only(), Arc::new(FailingResponder));

    let response = service.send_message(OutboundUserMessage::new("oi")).await;

    assert_eq!(response.provenance, Provenance::Local);
    assert_eq!(response.text, APOLOGY_TEXT);
}

#[tokio::test]
async fn test_responder_panic_yields_apology() {
    let service =
        HybridChatService::local_only(AssistantConfig::local_only(), Arc::new(PanickingResponder));

    let response = service.send_message(OutboundUserMessage::new("oi")).await;

    assert_eq!(response.provenance, Provenance::Local);
    assert_eq!(response.text, APOLOGY_TEXT);
}

#[tokio::test]
async fn test_probe_uses_assistant_lookup() {
    let transport = Arc::new(FakeTransport::answering("ok"));
    let responder = Arc::new(RecordingResponder::default());
    let service = build_service(config(), &transport, &responder);

    assert!(service.is_remote_available().await);
    assert_eq!(transport.calls(), vec!["assistant"]);
}

#[tokio::test]
async fn test_throwaway_thread_probe() {
    let transport = Arc::new(FakeTransport::answering("ok"));
    let responder = Arc::new(RecordingResponder::default());
    let service = build_service(config(), &transport, &responder)
        .with_probe_strategy(ProbeStrategy::ThrowawayThread);

    assert!(service.is_remote_available().await);
    assert_eq!(transport.calls(), vec!["thread", "delete"]);
    // The probe thread is not the conversation thread.
    assert!(service.current_thread().is_none());
}

#[tokio::test]
async fn test_unreachable_service_falls_back() {
    let config = AssistantConfig::new("asst_test", "sk-test")
        .with_base_url("http://127.0.0.1:9")
        .with_timeout(Duration::from_secs(5));
    let responder = Arc::new(RecordingResponder::default());
    let service = HybridChatService::from_config(config, responder.clone()).unwrap();

    let response = service.send_message(OutboundUserMessage::new("oi")).await;

    assert_eq!(response.provenance, Provenance::Local);
    assert_eq!(response.text, "local: oi");
    assert_eq!(responder.received.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_response_serializes_as_camel_case_json() {
    let responder = Arc::new(RecordingResponder::default());
    let service = HybridChatService::local_only(AssistantConfig::local_only(), responder);

    let response = service.send_message(OutboundUserMessage::new("oi")).await;
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["provenance"], "local");
    assert_eq!(json["metadata"]["fallbackReason"], "no_credential");
    assert!(json["metadata"]["duration"].is_u64());
    assert!(json["metadata"].get("threadId").is_none());
}
