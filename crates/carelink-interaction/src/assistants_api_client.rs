//! AssistantsApiClient - REST implementation of the thread-based assistant protocol.
//!
//! Talks to an OpenAI Assistants v2 compatible endpoint:
//! `threads`, `threads/{id}/messages`, `threads/{id}/runs`,
//! `threads/{id}/runs/{run_id}` and `assistants/{id}`.

use async_trait::async_trait;
use carelink_core::config::AssistantConfig;
use carelink_core::conversation::{
    AssistantInfo, AssistantsTransport, MessageContent, MessageRole, RunJob, RunStatus,
    ThreadHandle, ThreadMessage,
};
use carelink_core::error::{CarelinkError, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const BETA_HEADER: &str = "OpenAI-Beta";
const BETA_VALUE: &str = "assistants=v2";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP transport for the remote assistant service.
#[derive(Clone)]
pub struct AssistantsApiClient {
    client: Client,
    base_url: String,
    api_key: String,
    assistant_id: String,
}

impl AssistantsApiClient {
    /// Creates a client with a default `reqwest::Client`.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        assistant_id: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            assistant_id: assistant_id.into(),
        }
    }

    /// Creates a client whose individual requests are bounded by the
    /// configured per-call timeout.
    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        if !config.has_credential() {
            return Err(CarelinkError::config(
                "Remote assistant client requires a credential",
            ));
        }

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(config.timeout()))
            .timeout(config.timeout())
            .build()
            .map_err(|e| CarelinkError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            api_key: config.api_key().to_string(),
            assistant_id: config.assistant_id().to_string(),
        })
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER, BETA_VALUE)
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|err| map_transport_error(err, operation))?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(map_http_error(status, &body_text, operation));
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<T> {
        let response = self.send(request, operation).await?;
        response.json::<T>().await.map_err(|err| {
            if err.is_decode() {
                CarelinkError::malformed(format!("{operation}: {err}"))
            } else {
                map_transport_error(err, operation)
            }
        })
    }
}

#[async_trait]
impl AssistantsTransport for AssistantsApiClient {
    async fn create_thread(&self) -> Result<ThreadHandle> {
        let thread: ThreadObject = self
            .send_json(
                self.request(Method::POST, "threads").json(&serde_json::json!({})),
                "create thread",
            )
            .await?;
        Ok(ThreadHandle::new(thread.id))
    }

    async fn delete_thread(&self, thread: &ThreadHandle) -> Result<()> {
        self.send(
            self.request(Method::DELETE, &format!("threads/{thread}")),
            "delete thread",
        )
        .await?;
        Ok(())
    }

    async fn create_message(&self, thread: &ThreadHandle, text: &str) -> Result<()> {
        let body = CreateMessageRequest {
            role: "user",
            content: text,
        };
        self.send(
            self.request(Method::POST, &format!("threads/{thread}/messages"))
                .json(&body),
            "post message",
        )
        .await?;
        Ok(())
    }

    async fn create_run(&self, thread: &ThreadHandle) -> Result<RunJob> {
        let body = CreateRunRequest {
            assistant_id: &self.assistant_id,
        };
        let run: RunObject = self
            .send_json(
                self.request(Method::POST, &format!("threads/{thread}/runs"))
                    .json(&body),
                "trigger run",
            )
            .await?;
        Ok(run.into_domain())
    }

    async fn retrieve_run(&self, thread: &ThreadHandle, run_id: &str) -> Result<RunJob> {
        let run: RunObject = self
            .send_json(
                self.request(Method::GET, &format!("threads/{thread}/runs/{run_id}")),
                "poll run",
            )
            .await?;
        Ok(run.into_domain())
    }

    async fn cancel_run(&self, thread: &ThreadHandle, run_id: &str) -> Result<()> {
        self.send(
            self.request(
                Method::POST,
                &format!("threads/{thread}/runs/{run_id}/cancel"),
            ),
            "cancel run",
        )
        .await?;
        Ok(())
    }

    async fn list_messages(
        &self,
        thread: &ThreadHandle,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>> {
        let limit = limit.to_string();
        let list: MessageList = self
            .send_json(
                self.request(Method::GET, &format!("threads/{thread}/messages"))
                    .query(&[("order", "desc"), ("limit", limit.as_str())]),
                "fetch messages",
            )
            .await?;
        Ok(list.data.into_iter().map(MessageObject::into_domain).collect())
    }

    async fn retrieve_assistant(&self) -> Result<AssistantInfo> {
        let assistant: AssistantObject = self
            .send_json(
                self.request(Method::GET, &format!("assistants/{}", self.assistant_id)),
                "retrieve assistant",
            )
            .await?;
        Ok(AssistantInfo {
            id: assistant.id,
            name: assistant.name,
            model: assistant.model,
        })
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct CreateMessageRequest<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
}

#[derive(Deserialize)]
struct ThreadObject {
    id: String,
}

#[derive(Deserialize)]
struct RunObject {
    id: String,
    thread_id: String,
    status: RunStatus,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    last_error: Option<RunErrorBody>,
}

#[derive(Deserialize)]
struct RunErrorBody {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

impl RunObject {
    fn into_domain(self) -> RunJob {
        let created_at = self
            .created_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);

        RunJob {
            id: self.id,
            thread: ThreadHandle::new(self.thread_id),
            status: self.status,
            created_at,
            model: self.model,
            last_error: self.last_error.map(|err| match err.code {
                Some(code) => format!("{code}: {}", err.message),
                None => err.message,
            }),
        }
    }
}

#[derive(Deserialize)]
struct MessageList {
    data: Vec<MessageObject>,
}

#[derive(Deserialize)]
struct MessageObject {
    id: String,
    role: MessageRole,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    run_id: Option<String>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<TextBody>,
}

#[derive(Deserialize)]
struct TextBody {
    value: String,
}

impl MessageObject {
    fn into_domain(self) -> ThreadMessage {
        ThreadMessage {
            id: self.id,
            role: self.role,
            content: self
                .content
                .into_iter()
                .map(|block| match (block.kind.as_str(), block.text) {
                    ("text", Some(text)) => MessageContent::Text(text.value),
                    _ => MessageContent::Unsupported(block.kind),
                })
                .collect(),
            run_id: self.run_id,
        }
    }
}

#[derive(Deserialize)]
struct AssistantObject {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn map_transport_error(err: reqwest::Error, operation: &str) -> CarelinkError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    CarelinkError::RemoteUnavailable {
        status_code: err.status().map(|s| s.as_u16()),
        message: format!("{operation} {kind}: {err}"),
    }
}

fn map_http_error(status: StatusCode, body: &str, operation: &str) -> CarelinkError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.to_string());

    CarelinkError::remote_status(status.as_u16(), format!("{operation}: {message}"))
}
