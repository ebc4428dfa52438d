use serde::{Deserialize, Serialize};

use crate::registry::Mode;
use crate::stages::ConversationTurn;

/// One custom rubric criterion for Peer Review.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RubricCriterion {
    pub name: String,
    pub weight: f64,
}

/// A specialist role: library name or custom lens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpecialistRole {
    pub name: String,
    /// What this specialist prioritizes and judges by.
    pub focus: String,
}

/// One step of a Chain pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStep {
    pub model: String,
    pub mandate: String,
}

/// Per-run option bag. Recognized keys depend on the mode; unknown keys are
/// ignored at deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModeConfig {
    pub models: Option<Vec<String>>,
    pub council_models: Option<Vec<String>>,
    pub chairman_model: Option<String>,
    pub judge_model: Option<String>,
    pub generator_model: Option<String>,
    pub temperature: Option<f64>,
    pub max_rounds: Option<usize>,
    pub rounds: Option<usize>,
    pub review_type: Option<String>,
    pub custom_rubric: Option<Vec<RubricCriterion>>,
    pub document_type: Option<String>,
    pub content_to_check: Option<String>,
    pub max_tasks: Option<usize>,
    pub max_clusters: Option<usize>,
    pub max_content_length: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub numeric_threshold: Option<f64>,
    pub qualitative_threshold: Option<f64>,
    pub roles: Option<Vec<SpecialistRole>>,
    pub steps: Option<Vec<ChainStep>>,
}

/// An incoming deliberation request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliberationRequest {
    pub question: String,
    pub mode: Mode,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub mode_config: Option<ModeConfig>,
    /// Prior turns for multi-turn-capable modes, oldest first.
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}
