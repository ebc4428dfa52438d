use serde::{Deserialize, Serialize};

use crate::error::ConclaveError;

/// The fifteen deliberation modes. Wire names are snake_case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Council,
    Vote,
    Jury,
    Debate,
    Delphi,
    RedTeam,
    Chain,
    SpecialistPanel,
    Blueprint,
    PeerReview,
    Tournament,
    ConfidenceWeighted,
    Decompose,
    Brainstorm,
    FactCheck,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Council => "council",
            Self::Vote => "vote",
            Self::Jury => "jury",
            Self::Debate => "debate",
            Self::Delphi => "delphi",
            Self::RedTeam => "red_team",
            Self::Chain => "chain",
            Self::SpecialistPanel => "specialist_panel",
            Self::Blueprint => "blueprint",
            Self::PeerReview => "peer_review",
            Self::Tournament => "tournament",
            Self::ConfidenceWeighted => "confidence_weighted",
            Self::Decompose => "decompose",
            Self::Brainstorm => "brainstorm",
            Self::FactCheck => "fact_check",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ConclaveError> {
        MODES
            .iter()
            .map(|d| d.id)
            .find(|m| m.as_str() == raw)
            .ok_or_else(|| ConclaveError::UnknownMode(raw.to_string()))
    }
}

/// Immutable, process-wide mode definition.
#[derive(Debug, Clone, Serialize)]
pub struct ModeDef {
    pub id: Mode,
    pub name: &'static str,
    pub family: &'static str,
    pub min_models: usize,
    pub max_models: usize,
    pub requires_special_role: bool,
    pub supports_multi_turn: bool,
    pub estimated_duration_ms: u64,
}

pub const MODES: [ModeDef; 15] = [
    ModeDef {
        id: Mode::Council,
        name: "Council",
        family: "consensus",
        min_models: 2,
        max_models: 8,
        requires_special_role: true,
        supports_multi_turn: true,
        estimated_duration_ms: 120_000,
    },
    ModeDef {
        id: Mode::Vote,
        name: "Vote",
        family: "consensus",
        min_models: 2,
        max_models: 10,
        requires_special_role: false,
        supports_multi_turn: true,
        estimated_duration_ms: 90_000,
    },
    ModeDef {
        id: Mode::Jury,
        name: "Jury",
        family: "evaluation",
        min_models: 3,
        max_models: 6,
        requires_special_role: true,
        supports_multi_turn: false,
        estimated_duration_ms: 120_000,
    },
    ModeDef {
        id: Mode::Debate,
        name: "Debate",
        family: "adversarial",
        min_models: 2,
        max_models: 6,
        requires_special_role: false,
        supports_multi_turn: false,
        estimated_duration_ms: 180_000,
    },
    ModeDef {
        id: Mode::Delphi,
        name: "Delphi",
        family: "consensus",
        min_models: 3,
        max_models: 8,
        requires_special_role: true,
        supports_multi_turn: false,
        estimated_duration_ms: 240_000,
    },
    ModeDef {
        id: Mode::RedTeam,
        name: "Red Team",
        family: "adversarial",
        min_models: 2,
        max_models: 4,
        requires_special_role: false,
        supports_multi_turn: false,
        estimated_duration_ms: 180_000,
    },
    ModeDef {
        id: Mode::Chain,
        name: "Chain",
        family: "pipeline",
        min_models: 2,
        max_models: 8,
        requires_special_role: false,
        supports_multi_turn: false,
        estimated_duration_ms: 180_000,
    },
    ModeDef {
        id: Mode::SpecialistPanel,
        name: "Specialist Panel",
        family: "evaluation",
        min_models: 2,
        max_models: 6,
        requires_special_role: true,
        supports_multi_turn: false,
        estimated_duration_ms: 150_000,
    },
    ModeDef {
        id: Mode::Blueprint,
        name: "Blueprint",
        family: "pipeline",
        min_models: 2,
        max_models: 8,
        requires_special_role: true,
        supports_multi_turn: false,
        estimated_duration_ms: 240_000,
    },
    ModeDef {
        id: Mode::PeerReview,
        name: "Peer Review",
        family: "evaluation",
        min_models: 2,
        max_models: 6,
        requires_special_role: true,
        supports_multi_turn: false,
        estimated_duration_ms: 150_000,
    },
    ModeDef {
        id: Mode::Tournament,
        name: "Tournament",
        family: "adversarial",
        min_models: 2,
        max_models: 16,
        requires_special_role: true,
        supports_multi_turn: false,
        estimated_duration_ms: 240_000,
    },
    ModeDef {
        id: Mode::ConfidenceWeighted,
        name: "Confidence-Weighted",
        family: "consensus",
        min_models: 1,
        max_models: 8,
        requires_special_role: true,
        supports_multi_turn: true,
        estimated_duration_ms: 120_000,
    },
    ModeDef {
        id: Mode::Decompose,
        name: "Decompose",
        family: "pipeline",
        min_models: 2,
        max_models: 8,
        requires_special_role: true,
        supports_multi_turn: false,
        estimated_duration_ms: 300_000,
    },
    ModeDef {
        id: Mode::Brainstorm,
        name: "Brainstorm",
        family: "generation",
        min_models: 2,
        max_models: 8,
        requires_special_role: true,
        supports_multi_turn: false,
        estimated_duration_ms: 240_000,
    },
    ModeDef {
        id: Mode::FactCheck,
        name: "Fact-Check",
        family: "evaluation",
        min_models: 2,
        max_models: 6,
        requires_special_role: true,
        supports_multi_turn: false,
        estimated_duration_ms: 180_000,
    },
];

pub fn mode_def(mode: Mode) -> &'static ModeDef {
    MODES
        .iter()
        .find(|d| d.id == mode)
        .expect("every Mode variant has a definition")
}

/// Dispatcher-side constraint check: model count within the mode's bounds.
pub fn validate_model_count(mode: Mode, count: usize) -> Result<(), ConclaveError> {
    let def = mode_def(mode);
    if count < def.min_models || count > def.max_models {
        return Err(ConclaveError::ModelCount {
            mode: mode.as_str().to_string(),
            min: def.min_models,
            max: def.max_models,
            got: count,
        });
    }
    Ok(())
}
