use serde::{Deserialize, Serialize};

use crate::parsers::{bounded_score, first_value, numbered_blocks};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewSeverity {
    Suggestion,
    Minor,
    Major,
    Critical,
}

impl ReviewSeverity {
    pub fn parse_or_default(raw: &str) -> Self {
        let token = raw.trim().trim_matches('*').to_uppercase();
        if token.starts_with("CRITICAL") {
            Self::Critical
        } else if token.starts_with("MAJOR") {
            Self::Major
        } else if token.starts_with("MINOR") {
            Self::Minor
        } else {
            Self::Suggestion
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Suggestion => "SUGGESTION",
            Self::Minor => "MINOR",
            Self::Major => "MAJOR",
            Self::Critical => "CRITICAL",
        }
    }
}

/// One scored rubric criterion from a reviewer's table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion: String,
    /// 1–10.
    pub score: f64,
    pub weight: f64,
    pub justification: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFinding {
    pub number: usize,
    pub severity: ReviewSeverity,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewerReport {
    pub scores: Vec<CriterionScore>,
    pub findings: Vec<ReviewFinding>,
    /// Weighted mean over scored criteria; None when nothing scored.
    pub overall: Option<f64>,
}

/// Parse a reviewer reply: a markdown scoring table
/// (`| criterion | score | weight | justification |`) plus numbered
/// `FINDING n:` blocks with `Severity:` fields.
pub fn parse_reviewer(text: &str, rubric_weights: &[(String, f64)]) -> ReviewerReport {
    let mut scores = Vec::new();
    for line in text.lines() {
        if !line.contains('|') {
            continue;
        }
        let cells: Vec<String> = line
            .split('|')
            .map(|c| c.trim().trim_matches('*').trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if cells.len() < 2 || cells[0].chars().all(|c| c == '-' || c == ':') {
            continue;
        }
        let Some(score) = bounded_score(&cells[1], 1.0, 10.0) else {
            continue;
        };
        // Weight: third column when present, else the rubric's weight for
        // the criterion, else 1.
        let weight = cells
            .get(2)
            .and_then(|c| bounded_score(c.trim_end_matches('%'), 0.0, 100.0))
            .or_else(|| {
                rubric_weights
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(&cells[0]))
                    .map(|(_, w)| *w)
            })
            .unwrap_or(1.0);
        let justification = cells.get(3).cloned().unwrap_or_default();
        scores.push(CriterionScore {
            criterion: cells[0].clone(),
            score,
            weight,
            justification,
        });
    }

    let findings = numbered_blocks(text, "FINDING")
        .into_iter()
        .map(|b| {
            let severity = first_value(&b.body, "SEVERITY")
                .or_else(|| Some(b.header.clone()).filter(|h| !h.is_empty()))
                .map(|v| ReviewSeverity::parse_or_default(&v))
                .unwrap_or(ReviewSeverity::Suggestion);
            let detail = if b.header.is_empty() {
                b.body
            } else if b.body.is_empty() {
                b.header
            } else {
                format!("{}\n{}", b.header, b.body)
            };
            ReviewFinding {
                number: b.number,
                severity,
                detail,
            }
        })
        .collect();

    let overall = weighted_mean(&scores);

    ReviewerReport {
        scores,
        findings,
        overall,
    }
}

fn weighted_mean(scores: &[CriterionScore]) -> Option<f64> {
    let total_weight: f64 = scores.iter().map(|s| s.weight).sum();
    if total_weight <= 0.0 {
        return None;
    }
    Some(scores.iter().map(|s| s.score * s.weight).sum::<f64>() / total_weight)
}

/// Per-criterion consensus across reviewers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionConsensus {
    pub criterion: String,
    pub average: f64,
    pub stddev: f64,
    /// High (< 0.5), Medium (≤ 1.5), Low (> 1.5) by population stddev.
    pub agreement: String,
}

pub fn criterion_consensus(reports: &[ReviewerReport]) -> Vec<CriterionConsensus> {
    use std::collections::BTreeMap;

    let mut by_criterion: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for report in reports {
        for s in &report.scores {
            by_criterion
                .entry(s.criterion.to_lowercase())
                .or_default()
                .push(s.score);
        }
    }

    by_criterion
        .into_iter()
        .filter_map(|(criterion, values)| {
            let summary = crate::aggregate::numeric_summary(&values)?;
            let agreement = if summary.stddev < 0.5 {
                "High".to_string()
            } else if summary.stddev <= 1.5 {
                "Medium".to_string()
            } else {
                "Low".to_string()
            };
            Some(CriterionConsensus {
                criterion,
                average: summary.mean,
                stddev: summary.stddev,
                agreement,
            })
        })
        .collect()
}
