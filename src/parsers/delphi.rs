use serde::{Deserialize, Serialize};

use crate::parsers::{csv_items, first_number, first_value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Numeric,
    Qualitative,
}

/// Facilitator classification of the panel question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub kind: QuestionKind,
    /// Choice options the facilitator enumerated, if any.
    pub options: Vec<String>,
}

/// Parse the facilitator's `TYPE: numeric|qualitative` tag and optional
/// `OPTIONS:` list. Default on failure is qualitative — the mode that never
/// mis-aggregates free-text answers as numbers.
pub fn parse_classification(text: &str) -> Classification {
    let kind = first_value(text, "TYPE")
        .map(|v| v.to_lowercase())
        .and_then(|v| {
            if v.starts_with("numeric") {
                Some(QuestionKind::Numeric)
            } else if v.starts_with("qualitative") {
                Some(QuestionKind::Qualitative)
            } else {
                None
            }
        })
        .unwrap_or(QuestionKind::Qualitative);

    let options = first_value(text, "OPTIONS")
        .map(|v| csv_items(&v))
        .unwrap_or_default();

    Classification { kind, options }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

/// `CONFIDENCE: LOW|MEDIUM|HIGH`, default MEDIUM.
pub fn parse_confidence_level(text: &str) -> ConfidenceLevel {
    first_value(text, "CONFIDENCE")
        .map(|v| v.to_uppercase())
        .and_then(|v| {
            if v.starts_with("LOW") {
                Some(ConfidenceLevel::Low)
            } else if v.starts_with("MEDIUM") {
                Some(ConfidenceLevel::Medium)
            } else if v.starts_with("HIGH") {
                Some(ConfidenceLevel::High)
            } else {
                None
            }
        })
        .unwrap_or(ConfidenceLevel::Medium)
}

/// `ESTIMATE:` line, falling back to the first signed/decimal number in the
/// reply. None excludes the panelist from the round.
pub fn parse_numeric_estimate(text: &str) -> Option<f64> {
    if let Some(line) = first_value(text, "ESTIMATE")
        && let Some(v) = first_number(&line)
    {
        return Some(v);
    }
    first_number(text)
}

/// `ANSWER:` line. None excludes the panelist from the round.
pub fn parse_qualitative_answer(text: &str) -> Option<String> {
    first_value(text, "ANSWER").filter(|v| !v.is_empty())
}
