//! Mode runners: one state machine per deliberation mode.
//!
//! Shared contract: the runner emits `<mode>_start` first, one
//! `<phase>_start` / `<phase>_complete` pair per phase, and appends one
//! stage record per model call. On a fatal condition it emits `error` and
//! returns with the records accumulated so far. It never emits `complete` —
//! the dispatcher appends the shared terminal events after title
//! generation.

pub mod blueprint;
pub mod brainstorm;
pub mod chain;
pub mod confidence;
pub mod council;
pub mod debate;
pub mod decompose;
pub mod delphi;
pub mod factcheck;
pub mod jury;
pub mod panel;
pub mod redteam;
pub mod review;
pub mod tournament;
pub mod vote;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::events::EventSink;
use crate::gateway::ModelGateway;
use crate::registry::Mode;
use crate::request::ModeConfig;
use crate::stages::{ConversationTurn, Stage1Response, StageLog, StageRecord};

/// How the runner terminated. `Failed` means an `error` event was already
/// emitted; either way the accumulated stage records are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed,
}

/// Everything a runner needs: identifiers, resolved participants, the two
/// collaborator handles, and the in-order stage accumulator.
pub struct RunContext {
    pub conversation_id: String,
    pub message_id: String,
    pub mode: Mode,
    pub question: String,
    pub history: Vec<ConversationTurn>,
    pub config: ModeConfig,
    pub models: Vec<String>,
    pub timeout: Duration,
    pub gateway: Arc<dyn ModelGateway>,
    pub sink: EventSink,
    pub stages: StageLog,
}

#[derive(Serialize)]
struct StartPayload<'a> {
    conversation_id: &'a str,
    message_id: &'a str,
    mode: &'a str,
    models: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<&'a str>,
}

impl RunContext {
    /// Emit the standard `<mode>_start` event.
    pub fn emit_start(&self) {
        self.emit_start_with_warning(None);
    }

    /// Start event carrying a non-fatal hint (e.g. fact-check's bias flag).
    pub fn emit_start_with_warning(&self, warning: Option<&str>) {
        let kind = format!("{}_start", self.mode.as_str());
        self.sink.emit_with(
            kind,
            &StartPayload {
                conversation_id: &self.conversation_id,
                message_id: &self.message_id,
                mode: self.mode.as_str(),
                models: &self.models,
                warning,
            },
        );
    }

    pub fn phase_start(&self, phase: &str) {
        self.sink.emit_bare(format!("{phase}_start"));
    }

    pub fn phase_complete(&self, phase: &str, payload: &impl Serialize) {
        self.sink.emit_with(format!("{phase}_complete"), payload);
    }

    /// Fatal condition: log, emit the terminal `error` event, return Failed.
    pub fn fatal(&self, phase: &str, reason: impl Into<String>) -> RunOutcome {
        let reason = reason.into();
        tracing::error!(mode = self.mode.as_str(), phase, "fatal: {reason}");
        self.sink.emit_error(format!("{phase} failed: {reason}"));
        RunOutcome::Failed
    }

    /// The single special-role model (chairman, foreman, facilitator, …).
    /// Defaults to the first configured model.
    pub fn special_role_model(&self) -> String {
        self.config
            .chairman_model
            .clone()
            .or_else(|| self.models.first().cloned())
            .unwrap_or_default()
    }

    /// Prior history plus the current question, as alternating turns.
    pub fn turns_with_question(&self) -> Vec<ConversationTurn> {
        let mut turns = self.history.clone();
        turns.push(ConversationTurn::user(&self.question));
        turns
    }
}

/// Fan the user question out to all participant models and keep the
/// replies with non-empty content, in configured model order. Appends one
/// stage record per surviving reply.
pub(crate) async fn collect_initial(ctx: &mut RunContext, stage_type: &str) -> Vec<Stage1Response> {
    let replies = if ctx.history.is_empty() {
        ctx.gateway
            .query_many(&ctx.models, &ctx.question, ctx.timeout)
            .await
    } else {
        let turns = ctx.turns_with_question();
        ctx.gateway
            .query_many_with_messages(&ctx.models, &turns, ctx.timeout)
            .await
    };

    let mut out = Vec::new();
    for model in ctx.models.clone() {
        let Some(reply) = replies.get(&model) else {
            continue;
        };
        if reply.content.trim().is_empty() {
            tracing::warn!(%model, "empty initial response — excluded");
            continue;
        }
        let response = Stage1Response {
            model: model.clone(),
            response: reply.content.clone(),
            response_time_ms: reply.response_time_ms,
        };
        ctx.stages.push(
            StageRecord::new(stage_type, &response.response)
                .model(&model)
                .time_ms(reply.response_time_ms),
        );
        out.push(response);
    }
    out
}

/// Dispatch to the runner for the context's mode.
pub async fn run_mode(ctx: &mut RunContext) -> RunOutcome {
    match ctx.mode {
        Mode::Council => council::run(ctx).await,
        Mode::Vote => vote::run(ctx).await,
        Mode::Jury => jury::run(ctx).await,
        Mode::Debate => debate::run(ctx).await,
        Mode::Delphi => delphi::run(ctx).await,
        Mode::RedTeam => redteam::run(ctx).await,
        Mode::Chain => chain::run(ctx).await,
        Mode::SpecialistPanel => panel::run(ctx).await,
        Mode::Blueprint => blueprint::run(ctx).await,
        Mode::PeerReview => review::run(ctx).await,
        Mode::Tournament => tournament::run(ctx).await,
        Mode::ConfidenceWeighted => confidence::run(ctx).await,
        Mode::Decompose => decompose::run(ctx).await,
        Mode::Brainstorm => brainstorm::run(ctx).await,
        Mode::FactCheck => factcheck::run(ctx).await,
    }
}
