use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Speaker of a prior conversation turn, passed to multi-turn modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
        }
    }
}

/// A surviving initial answer. Created when a model returns non-empty
/// content in an initial-answer step; immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage1Response {
    pub model: String,
    pub response: String,
    pub response_time_ms: u64,
}

/// One externally visible phase of a run, appended in-order and handed to
/// the persistence collaborator on exit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage_type: String,
    pub stage_order: u32,
    pub model: Option<String>,
    pub role: Option<String>,
    pub content: String,
    pub parsed_data: Option<Value>,
    pub response_time_ms: Option<u64>,
}

impl StageRecord {
    pub fn new(stage_type: &str, content: &str) -> Self {
        Self {
            stage_type: stage_type.to_string(),
            stage_order: 0,
            model: None,
            role: None,
            content: content.to_string(),
            parsed_data: None,
            response_time_ms: None,
        }
    }

    pub fn model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    /// Attach parsed structured data. Serialization failure is downgraded to
    /// a missing payload — stage persistence must never abort a run.
    pub fn parsed(mut self, data: &impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(v) => self.parsed_data = Some(v),
            Err(e) => tracing::warn!(stage = %self.stage_type, "unserializable parsed_data: {e}"),
        }
        self
    }

    pub fn time_ms(mut self, ms: u64) -> Self {
        self.response_time_ms = Some(ms);
        self
    }
}

/// In-order stage accumulator. Assigns `stage_order` monotonically so the
/// persisted total order matches event order.
#[derive(Debug, Default)]
pub struct StageLog {
    records: Vec<StageRecord>,
    next_order: u32,
}

impl StageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mut record: StageRecord) {
        record.stage_order = self.next_order;
        self.next_order += 1;
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<StageRecord> {
        self.records
    }
}
