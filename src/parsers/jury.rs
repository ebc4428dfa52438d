use serde::{Deserialize, Serialize};

use crate::aggregate::round1;
use crate::parsers::{bounded_score, clean_line, first_value};

pub const DIMENSIONS: [&str; 5] = [
    "Accuracy",
    "Completeness",
    "Clarity",
    "Relevance",
    "Actionability",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JuryVerdict {
    Approve,
    Revise,
    Reject,
}

impl JuryVerdict {
    pub fn parse(raw: &str) -> Option<Self> {
        let token = raw.trim().trim_matches('*').to_uppercase();
        if token.starts_with("APPROVE") {
            Some(Self::Approve)
        } else if token.starts_with("REVISE") {
            Some(Self::Revise)
        } else if token.starts_with("REJECT") {
            Some(Self::Reject)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::Revise => "REVISE",
            Self::Reject => "REJECT",
        }
    }
}

/// One juror's parsed scorecard. Scores outside 1–10 are discarded (None);
/// `average` covers the non-null scores only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JurorScores {
    /// Dimension name → parsed score, in [`DIMENSIONS`] order.
    pub scores: Vec<(String, Option<f64>)>,
    pub average: Option<f64>,
    pub verdict: Option<JuryVerdict>,
}

/// Parse a juror's free-form reply.
///
/// Score extraction tries, in order: markdown table rows
/// (`| Accuracy | 8 | … |`), `Accuracy: 8`, `Accuracy: 8/10`,
/// `**Accuracy**: 8`. The verdict comes from a `VERDICT:` line; an
/// unparseable verdict is None and excluded from the majority tally.
pub fn parse_juror(text: &str) -> JurorScores {
    let scores: Vec<(String, Option<f64>)> = DIMENSIONS
        .iter()
        .map(|dim| (dim.to_string(), dimension_score(text, dim)))
        .collect();

    let parsed: Vec<f64> = scores.iter().filter_map(|(_, s)| *s).collect();
    let average = if parsed.is_empty() {
        None
    } else {
        Some(round1(parsed.iter().sum::<f64>() / parsed.len() as f64))
    };

    let verdict = first_value(text, "VERDICT").and_then(|v| JuryVerdict::parse(&v));

    JurorScores {
        scores,
        average,
        verdict,
    }
}

fn dimension_score(text: &str, dim: &str) -> Option<f64> {
    for line in text.lines() {
        // Table row: cells split on '|', dimension in one cell, score next.
        if line.contains('|') {
            let cells: Vec<String> = line
                .split('|')
                .map(|c| c.trim().trim_matches('*').trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            if let Some(idx) = cells.iter().position(|c| c.eq_ignore_ascii_case(dim))
                && let Some(raw) = cells.get(idx + 1)
                && let Some(score) = bounded_score(raw, 1.0, 10.0)
            {
                return Some(score);
            }
            continue;
        }
        // `Dimension: N`, `Dimension: N/10`, `**Dimension**: N`
        let cleaned = clean_line(line);
        if let Some((head, rest)) = cleaned.split_once(':')
            && head.trim().eq_ignore_ascii_case(dim)
            && let Some(score) = bounded_score(rest, 1.0, 10.0)
        {
            return Some(score);
        }
    }
    None
}

/// Majority verdict with the documented tie-breaking: a three-way tie, any
/// tie involving REVISE, and an APPROVE/REJECT tie all resolve to REVISE.
pub fn majority_verdict(verdicts: &[JuryVerdict]) -> Option<JuryVerdict> {
    if verdicts.is_empty() {
        return None;
    }
    let counts = crate::aggregate::tally(verdicts.iter().copied());
    let (winners, _) = crate::aggregate::leaders(&counts);
    match winners.as_slice() {
        [single] => Some(*single),
        _ => Some(JuryVerdict::Revise),
    }
}
