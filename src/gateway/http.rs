use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::ConclaveError;
use crate::gateway::{ModelGateway, ModelReply};
use crate::stages::{ConversationTurn, Role};

pub const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024; // 2MB

/// Maximum time to wait for response headers after sending the request.
const HEADERS_TIMEOUT: Duration = Duration::from_secs(60);

/// Duration without any SSE data event before the call is abandoned.
/// Keepalive comments are dropped by eventsource-stream and cannot reset
/// this timer — only real data events count.
const STALL_TIMEOUT: Duration = Duration::from_secs(60);

/// SSE streaming chunk from an OpenAI-compatible chat completions API.
#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Gateway against a single OpenAI-compatible streaming endpoint.
///
/// Cheap to clone: the reqwest client is internally pooled, and the
/// cancellation token is shared so the event-stream consumer dropping its
/// receiver aborts every in-flight call.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    cancel: CancellationToken,
}

impl HttpGateway {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            cancel: CancellationToken::new(),
        }
    }

    /// Share a run's cancellation token so sibling calls abort together.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    fn messages_json(turns: &[ConversationTurn]) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = turns
            .iter()
            .map(|t| {
                let role = match t.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                serde_json::json!({"role": role, "content": t.content})
            })
            .collect();
        serde_json::Value::Array(messages)
    }

    async fn request(
        &self,
        model: &str,
        messages: &serde_json::Value,
        deadline: Instant,
    ) -> Result<String, ConclaveError> {
        let start = Instant::now();

        let Some(ref api_key) = self.api_key else {
            return Err(ConclaveError::AuthFailed {
                provider: "gateway".to_string(),
                message: "no credential configured".to_string(),
            });
        };

        let remaining = deadline
            .checked_duration_since(Instant::now())
            .filter(|d| *d > Duration::from_millis(100))
            .ok_or(ConclaveError::Timeout(0))?;

        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": true,
        });

        // Scoped timeout around send() — client-level connect_timeout covers
        // TCP/TLS; this covers the gap to the first response header.
        let headers_timeout = remaining.min(HEADERS_TIMEOUT);
        let send_future = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send();

        let response = tokio::time::timeout(headers_timeout, send_future)
            .await
            .map_err(|_| ConclaveError::Timeout(start.elapsed().as_millis() as u64))?
            .map_err(ConclaveError::from)?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ConclaveError::RateLimited {
                provider: "gateway".to_string(),
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ConclaveError::AuthFailed {
                provider: "gateway".to_string(),
                message: format!("{status}"),
            });
        }

        if !status.is_success() {
            return Err(ConclaveError::Upstream {
                provider: "gateway".to_string(),
                message: format!("{status}"),
                status: Some(status.as_u16()),
            });
        }

        self.read_sse_stream(response, model, start, deadline).await
    }

    /// Accumulate SSE content chunks until `[DONE]`, the deadline, a stall,
    /// or cancellation. A call that times out mid-stream is a failure — the
    /// orchestration layer treats partial structured output as unusable.
    async fn read_sse_stream(
        &self,
        response: reqwest::Response,
        model: &str,
        start: Instant,
        deadline: Instant,
    ) -> Result<String, ConclaveError> {
        let mut stream = response.bytes_stream().eventsource();
        let mut accumulated = String::new();

        let remaining = deadline
            .checked_duration_since(Instant::now())
            .unwrap_or(Duration::ZERO);
        let generation_deadline = tokio::time::Instant::now() + remaining;
        let mut last_chunk_at = tokio::time::Instant::now();

        let deadline_sleep = tokio::time::sleep_until(generation_deadline);
        tokio::pin!(deadline_sleep);

        loop {
            let effective = generation_deadline.min(last_chunk_at + STALL_TIMEOUT);
            deadline_sleep.as_mut().reset(effective);

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(ConclaveError::Cancelled(start.elapsed().as_millis() as u64));
                }
                _ = &mut deadline_sleep => {
                    if !accumulated.is_empty() {
                        tracing::warn!(model, bytes = accumulated.len(),
                            "dropping partial response at deadline/stall");
                    }
                    return Err(ConclaveError::Timeout(start.elapsed().as_millis() as u64));
                }
                event = stream.next() => match event {
                    Some(Ok(ev)) => {
                        if ev.data.trim() == "[DONE]" {
                            break;
                        }
                        // Any data event proves the server is alive.
                        last_chunk_at = tokio::time::Instant::now();
                        let Ok(chunk) = serde_json::from_str::<StreamChunk>(&ev.data) else {
                            continue;
                        };
                        if let Some(choice) = chunk.choices.first()
                            && let Some(ref content) = choice.delta.content
                            && !content.is_empty()
                        {
                            if accumulated.len() + content.len() > MAX_RESPONSE_BYTES {
                                return Err(ConclaveError::Upstream {
                                    provider: "gateway".to_string(),
                                    message: format!(
                                        "streaming response too large: >{MAX_RESPONSE_BYTES}B"
                                    ),
                                    status: None,
                                });
                            }
                            accumulated.push_str(content);
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(model, "SSE stream error: {e}");
                        return Err(ConclaveError::Other(format!(
                            "SSE stream error for {model}"
                        )));
                    }
                    None => {
                        // Stream ended without [DONE]. Accept accumulated text
                        // if any arrived; some providers close cleanly early.
                        if accumulated.is_empty() {
                            return Err(ConclaveError::Upstream {
                                provider: "gateway".to_string(),
                                message: "stream ended without [DONE] marker".to_string(),
                                status: None,
                            });
                        }
                        break;
                    }
                },
            }
        }

        if accumulated.is_empty() {
            return Err(ConclaveError::Upstream {
                provider: "gateway".to_string(),
                message: "empty streaming response".to_string(),
                status: None,
            });
        }

        Ok(accumulated)
    }

    /// Spawn one task per model and collect successes keyed by model id.
    /// One sibling's failure (or panic) never affects the others.
    async fn fan_out(
        &self,
        models: &[String],
        messages: Arc<serde_json::Value>,
        timeout: Duration,
    ) -> HashMap<String, ModelReply> {
        let deadline = Instant::now() + timeout;
        let mut set = JoinSet::new();
        let mut task_models: HashMap<tokio::task::Id, String> = HashMap::new();

        for model in models {
            let gateway = self.clone();
            let model_for_map = model.clone();
            let model = model.clone();
            let messages = messages.clone();
            let handle = set.spawn(async move {
                let started = Instant::now();
                let result = gateway.request(&model, &messages, deadline).await;
                let elapsed = started.elapsed().as_millis() as u64;
                (model, result, elapsed)
            });
            task_models.insert(handle.id(), model_for_map);
        }

        let mut replies = HashMap::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((model, Ok(content), elapsed)) => {
                    replies.insert(
                        model,
                        ModelReply {
                            content,
                            response_time_ms: elapsed,
                        },
                    );
                }
                Ok((model, Err(e), _)) => {
                    tracing::warn!(model, "gateway call failed: {e}");
                }
                Err(join_err) if join_err.is_panic() => {
                    let model = task_models
                        .get(&join_err.id())
                        .map(String::as_str)
                        .unwrap_or("unknown");
                    tracing::error!(model, "gateway task panicked: {join_err}");
                }
                Err(_) => {} // cancelled
            }
        }
        replies
    }
}

#[async_trait]
impl ModelGateway for HttpGateway {
    async fn query_one(&self, model: &str, prompt: &str, timeout: Duration) -> Option<ModelReply> {
        let turns = [ConversationTurn::user(prompt)];
        self.query_one_with_messages(model, &turns, timeout).await
    }

    async fn query_one_with_messages(
        &self,
        model: &str,
        turns: &[ConversationTurn],
        timeout: Duration,
    ) -> Option<ModelReply> {
        let messages = Self::messages_json(turns);
        let started = Instant::now();
        match self.request(model, &messages, Instant::now() + timeout).await {
            Ok(content) => Some(ModelReply {
                content,
                response_time_ms: started.elapsed().as_millis() as u64,
            }),
            Err(e) => {
                tracing::warn!(model, "gateway call failed: {e}");
                None
            }
        }
    }

    async fn query_many(
        &self,
        models: &[String],
        prompt: &str,
        timeout: Duration,
    ) -> HashMap<String, ModelReply> {
        let messages = Arc::new(Self::messages_json(&[ConversationTurn::user(prompt)]));
        self.fan_out(models, messages, timeout).await
    }

    async fn query_many_with_messages(
        &self,
        models: &[String],
        turns: &[ConversationTurn],
        timeout: Duration,
    ) -> HashMap<String, ModelReply> {
        let messages = Arc::new(Self::messages_json(turns));
        self.fan_out(models, messages, timeout).await
    }
}
