//! Dispatcher: validates the request, allocates ids, invokes the runner,
//! and appends the shared terminal events (title, complete).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::config::{Config, MAX_TIMEOUT_SECS};
use crate::events::EventSink;
use crate::gateway::ModelGateway;
use crate::modes::{RunContext, RunOutcome, run_mode};
use crate::registry::validate_model_count;
use crate::request::DeliberationRequest;
use crate::stages::{StageLog, StageRecord};
use crate::store::StageStore;

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Timeout for the post-run title call — deliberately tight; title failure
/// is non-fatal.
const TITLE_TIMEOUT: Duration = Duration::from_secs(15);

pub const FALLBACK_TITLE: &str = "New Conversation";

#[derive(Serialize)]
struct TitlePayload<'a> {
    title: &'a str,
}

pub struct Deliberation {
    config: Config,
    gateway: Arc<dyn ModelGateway>,
    store: Arc<dyn StageStore>,
}

impl Deliberation {
    pub fn new(config: Config, gateway: Arc<dyn ModelGateway>, store: Arc<dyn StageStore>) -> Self {
        Self {
            config,
            gateway,
            store,
        }
    }

    /// Run one deliberation to completion, streaming events into `sink`.
    /// Returns the persisted stage records (also handed to the store).
    pub async fn run(&self, request: DeliberationRequest, sink: EventSink) -> Vec<StageRecord> {
        let mode_config = request.mode_config.unwrap_or_default();

        // Participant models: mode config first, then process defaults.
        let models: Vec<String> = mode_config
            .council_models
            .clone()
            .or_else(|| mode_config.models.clone())
            .unwrap_or_else(|| self.config.default_models.clone());

        if let Err(e) = validate_model_count(request.mode, models.len()) {
            sink.emit_error(e.user_message());
            return Vec::new();
        }

        let conversation_id = request
            .conversation_id
            .unwrap_or_else(|| allocate_id("conv"));
        let message_id = allocate_id("msg");

        let timeout = mode_config
            .timeout_secs
            .map(|secs| Duration::from_secs(secs.clamp(1, MAX_TIMEOUT_SECS)))
            .unwrap_or(self.config.timeout);

        let mut ctx = RunContext {
            conversation_id: conversation_id.clone(),
            message_id: message_id.clone(),
            mode: request.mode,
            question: request.question,
            history: request.history,
            config: mode_config,
            models,
            timeout,
            gateway: self.gateway.clone(),
            sink: sink.clone(),
            stages: StageLog::new(),
        };

        tracing::info!(
            mode = request.mode.as_str(),
            %conversation_id,
            %message_id,
            models = ctx.models.len(),
            "deliberation starting"
        );
        let outcome = run_mode(&mut ctx).await;
        let records = ctx.stages.into_records();

        // Partial results survive a fatal error — the terminal `error`
        // event tells the caller the run did not complete.
        if let Err(e) = self
            .store
            .store(&conversation_id, &message_id, &records)
            .await
        {
            tracing::warn!("failed to persist stage records: {e}");
        }

        if outcome == RunOutcome::Failed {
            return records;
        }

        // Title generation: cheap model, tight timeout, non-fatal.
        let title = self.generate_title(&ctx.question).await;
        sink.emit_with("title_complete", &TitlePayload { title: &title });
        sink.emit_bare("complete");
        tracing::info!(%conversation_id, %message_id, "deliberation complete");
        records
    }

    async fn generate_title(&self, question: &str) -> String {
        let prompt = crate::prompts::title_prompt(question);
        match self
            .gateway
            .query_one(&self.config.title_model, &prompt, TITLE_TIMEOUT)
            .await
        {
            Some(reply) => clean_title(&reply.content),
            None => {
                tracing::warn!("title generation failed — using fallback");
                FALLBACK_TITLE.to_string()
            }
        }
    }
}

fn allocate_id(prefix: &str) -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let pid = std::process::id();
    let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{ts}_{pid}_{seq}")
}

/// Strip quotes, collapse to one line, cap at 50 chars with an ellipsis.
pub fn clean_title(raw: &str) -> String {
    let first_line = raw.trim().lines().next().unwrap_or("").trim();
    let cleaned = first_line
        .trim_matches(['"', '\'', '“', '”', '`', '.'])
        .trim();
    if cleaned.is_empty() {
        return FALLBACK_TITLE.to_string();
    }
    if cleaned.chars().count() > 50 {
        let mut truncated: String = cleaned.chars().take(49).collect();
        truncated.push('…');
        truncated
    } else {
        cleaned.to_string()
    }
}
