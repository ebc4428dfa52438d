use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::parsers::{clean_line, csv_items, first_value, numbered_blocks};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Promise {
    Low,
    Medium,
    High,
}

impl Promise {
    fn parse_or_default(raw: &str) -> Self {
        let token = raw.trim().trim_matches('*').to_uppercase();
        if token.starts_with("HIGH") {
            Self::High
        } else if token.starts_with("LOW") {
            Self::Low
        } else {
            Self::Medium
        }
    }

    /// Promise-level fallback score used when fewer than two scorers
    /// produced valid scores.
    pub fn fallback_score(&self) -> f64 {
        match self {
            Self::High => 12.0,
            Self::Medium => 8.0,
            Self::Low => 4.0,
        }
    }
}

/// One generated idea with its deterministic id and source label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Idea {
    /// `model_{i}_idea_{n}` — stable across the run.
    pub id: String,
    /// `Model A|B|…` from the source model's position.
    pub source_label: String,
    pub title: String,
    pub body: String,
}

/// Extract `IDEA n: Title` blocks from one ideator's reply and mint ids
/// from the ideator's position.
pub fn parse_ideas(text: &str, model_index: usize) -> Vec<Idea> {
    numbered_blocks(text, "IDEA")
        .into_iter()
        .map(|b| Idea {
            id: format!("model_{model_index}_idea_{}", b.number),
            source_label: crate::labels::model_label(model_index),
            title: b.header,
            body: b.body,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub number: usize,
    pub name: String,
    pub theme: String,
    pub promise: Promise,
    /// Resolved idea ids; unresolved refs are dropped.
    pub idea_ids: Vec<String>,
}

/// Parse `CLUSTER n:` blocks with `Name`, `Theme`,
/// `Promise ∈ {HIGH, MEDIUM, LOW}`, `Ideas: id, id, …`. Clusters left empty
/// after id resolution are dropped.
pub fn parse_clusters(text: &str, known_ids: &[String]) -> Vec<Cluster> {
    numbered_blocks(text, "CLUSTER")
        .into_iter()
        .filter_map(|b| {
            let name = first_value(&b.body, "NAME")
                .filter(|n| !n.is_empty())
                .or_else(|| Some(b.header.clone()).filter(|h| !h.is_empty()))
                .unwrap_or_else(|| format!("Cluster {}", b.number));
            let theme = first_value(&b.body, "THEME").unwrap_or_default();
            let promise = first_value(&b.body, "PROMISE")
                .map(|v| Promise::parse_or_default(&v))
                .unwrap_or(Promise::Medium);
            let idea_ids: Vec<String> = first_value(&b.body, "IDEAS")
                .map(|raw| csv_items(&raw))
                .unwrap_or_default()
                .into_iter()
                .filter(|id| known_ids.iter().any(|k| k.eq_ignore_ascii_case(id)))
                .collect();
            if idea_ids.is_empty() {
                return None;
            }
            Some(Cluster {
                number: b.number,
                name,
                theme,
                promise,
                idea_ids,
            })
        })
        .collect()
}

/// One scorer's 1–5 marks for a cluster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClusterScore {
    pub novelty: f64,
    pub feasibility: f64,
    pub impact: f64,
}

impl ClusterScore {
    pub fn total(&self) -> f64 {
        self.novelty + self.feasibility + self.impact
    }
}

/// Parse `CLUSTER n: Novelty=x Feasibility=y Impact=z` lines (1–5 each,
/// clamped). Clusters the scorer skipped are absent from the map.
pub fn parse_cluster_scores(text: &str) -> HashMap<usize, ClusterScore> {
    let mut out = HashMap::new();
    for line in text.lines() {
        let cleaned = clean_line(line);
        let Some((number, rest)) = crate::parsers::parse_block_header(&cleaned, "CLUSTER")
            .or_else(|| cluster_inline(&cleaned))
        else {
            continue;
        };
        let novelty = key_value(&rest, "Novelty");
        let feasibility = key_value(&rest, "Feasibility");
        let impact = key_value(&rest, "Impact");
        if let (Some(n), Some(f), Some(i)) = (novelty, feasibility, impact) {
            out.insert(
                number,
                ClusterScore {
                    novelty: n,
                    feasibility: f,
                    impact: i,
                },
            );
        }
    }
    out
}

/// `CLUSTER 2 Novelty=…` without the colon.
fn cluster_inline(cleaned: &str) -> Option<(usize, String)> {
    let rest = cleaned
        .strip_prefix("CLUSTER")
        .or_else(|| cleaned.strip_prefix("cluster"))?
        .trim_start();
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let number: usize = digits.parse().ok()?;
    Some((number, rest[digits.len()..].trim().to_string()))
}

/// `Key=N` with clamping into 1–5.
fn key_value(text: &str, key: &str) -> Option<f64> {
    let lower = text.to_ascii_lowercase();
    let pos = lower.find(&key.to_ascii_lowercase())?;
    let after = &text[pos + key.len()..];
    let after = after.trim_start().strip_prefix(['=', ':'])?.trim_start();
    let raw: String = after
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value: f64 = raw.parse().ok()?;
    Some(value.clamp(1.0, 5.0))
}

/// Group ideas by source model — the pseudo-cluster fallback when the
/// curator produced nothing parseable.
pub fn clusters_by_source(ideas: &[Idea]) -> Vec<Cluster> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    for idea in ideas {
        if !grouped.contains_key(&idea.source_label) {
            order.push(idea.source_label.clone());
        }
        grouped
            .entry(idea.source_label.clone())
            .or_default()
            .push(idea.id.clone());
    }
    order
        .into_iter()
        .enumerate()
        .map(|(i, label)| Cluster {
            number: i + 1,
            name: format!("Ideas from {label}"),
            theme: String::new(),
            promise: Promise::Medium,
            idea_ids: grouped.remove(&label).unwrap_or_default(),
        })
        .collect()
}
