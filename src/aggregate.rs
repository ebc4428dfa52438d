//! Numeric and statistical reducers shared across mode runners.
//!
//! Everything here is pure and synchronous. Missing entries are dropped from
//! numerators and denominators alike — callers pass only the values that
//! actually parsed.

use std::collections::HashMap;
use std::hash::Hash;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Round to 2 decimal places (aggregate ranks).
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Round to 1 decimal place (juror averages).
pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Uniform in-place permutation.
pub fn fisher_yates<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

/// Count occurrences of each vote.
pub fn tally<T, I>(votes: I) -> HashMap<T, usize>
where
    T: Eq + Hash,
    I: IntoIterator<Item = T>,
{
    let mut counts = HashMap::new();
    for v in votes {
        *counts.entry(v).or_insert(0usize) += 1;
    }
    counts
}

/// Labels sharing the maximum count, plus that count. Empty input → (vec![], 0).
pub fn leaders<T: Clone + Eq + Hash>(counts: &HashMap<T, usize>) -> (Vec<T>, usize) {
    let max = counts.values().copied().max().unwrap_or(0);
    let winners = counts
        .iter()
        .filter(|(_, c)| **c == max)
        .map(|(k, _)| k.clone())
        .collect();
    (winners, max)
}

/// Plurality result over string labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plurality {
    /// Label(s) sharing the maximum count, sorted for determinism.
    pub winners: Vec<String>,
    /// All counts, descending by count then ascending by label.
    pub counts: Vec<(String, usize)>,
    pub is_tie: bool,
}

pub fn plurality<S: AsRef<str>>(votes: &[S]) -> Option<Plurality> {
    if votes.is_empty() {
        return None;
    }
    let counts = tally(votes.iter().map(|v| v.as_ref().to_string()));
    let (mut winners, _) = leaders(&counts);
    winners.sort();
    let mut ordered: Vec<(String, usize)> = counts.into_iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let is_tie = winners.len() > 1;
    Some(Plurality {
        winners,
        counts: ordered,
        is_tie,
    })
}

/// Summary statistics over parsed numeric answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericSummary {
    pub n: usize,
    pub mean: f64,
    /// Linear interpolation on even N (midpoint of the two central values).
    pub median: f64,
    /// Population standard deviation.
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
    /// Coefficient of variation = stddev / |mean|. `f64::MAX` when the mean
    /// is (numerically) zero so convergence checks never fire on it.
    pub cv: f64,
}

pub fn numeric_summary(values: &[f64]) -> Option<NumericSummary> {
    if values.is_empty() {
        return None;
    }
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    let stddev = variance.sqrt();

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    };

    let cv = if mean.abs() < 1e-12 {
        f64::MAX
    } else {
        stddev / mean.abs()
    };

    Some(NumericSummary {
        n,
        mean,
        median,
        stddev,
        min: sorted[0],
        max: sorted[n - 1],
        cv,
    })
}

/// Frequency table over qualitative answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distribution {
    pub n: usize,
    /// Counts, descending by count then ascending by answer.
    pub counts: Vec<(String, usize)>,
    /// Highest-count answer (ties broken alphabetically).
    pub mode: String,
    pub mode_count: usize,
    /// mode_count / n, as a percentage.
    pub agreement_pct: f64,
}

pub fn distribution<S: AsRef<str>>(answers: &[S]) -> Option<Distribution> {
    if answers.is_empty() {
        return None;
    }
    let n = answers.len();
    let counts = tally(answers.iter().map(|a| a.as_ref().trim().to_string()));
    let mut ordered: Vec<(String, usize)> = counts.into_iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let (mode, mode_count) = ordered[0].clone();
    Some(Distribution {
        n,
        counts: ordered,
        mode,
        mode_count,
        agreement_pct: mode_count as f64 / n as f64 * 100.0,
    })
}

/// Temperature below which softmax degenerates to uniform weights.
pub const SOFTMAX_MIN_TEMPERATURE: f64 = 0.001;

/// Softmax over self-assessed confidences at temperature `t`.
/// `t < 0.001` falls back to uniform weights. Weights sum to 1.
pub fn softmax(confidences: &[f64], t: f64) -> Vec<f64> {
    let n = confidences.len();
    if n == 0 {
        return Vec::new();
    }
    if t < SOFTMAX_MIN_TEMPERATURE {
        return vec![1.0 / n as f64; n];
    }
    // Subtract the max exponent for numeric stability.
    let max = confidences
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = confidences.iter().map(|c| ((c - max) / t).exp()).collect();
    let sum: f64 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return vec![1.0 / n as f64; n];
    }
    exps.iter().map(|e| e / sum).collect()
}

/// Self-assessed confidence ≥ 0.95 or ≤ 0.1 is flagged to the synthesizer
/// for skeptical weighting.
pub fn is_confidence_outlier(c: f64) -> bool {
    c > 0.95 || c < 0.1
}

/// Kahn's algorithm with wave grouping. Each wave is the set of tasks whose
/// predecessors are all in earlier waves.
#[derive(Debug, Clone, PartialEq)]
pub enum TopoResult {
    Waves(Vec<Vec<String>>),
    /// `processed < N` with no zero-in-degree task remaining.
    Cycle {
        completed: Vec<Vec<String>>,
        remaining: Vec<String>,
    },
}

pub fn topo_waves(ids: &[String], deps: &HashMap<String, Vec<String>>) -> TopoResult {
    use std::collections::HashSet;

    let known: HashSet<&str> = ids.iter().map(String::as_str).collect();
    let mut done: HashSet<&str> = HashSet::new();
    let mut waves: Vec<Vec<String>> = Vec::new();

    while done.len() < ids.len() {
        // A task is ready when every known dependency is already processed.
        // Dependencies on unknown ids are ignored (callers clean refs first;
        // this keeps the sort total either way). Input order is preserved
        // within a wave.
        let wave: Vec<&str> = ids
            .iter()
            .map(String::as_str)
            .filter(|id| !done.contains(id))
            .filter(|id| {
                deps.get(*id).is_none_or(|d| {
                    d.iter()
                        .all(|dep| !known.contains(dep.as_str()) || done.contains(dep.as_str()))
                })
            })
            .collect();
        if wave.is_empty() {
            let remaining = ids
                .iter()
                .filter(|id| !done.contains(id.as_str()))
                .cloned()
                .collect();
            return TopoResult::Cycle {
                completed: waves,
                remaining,
            };
        }
        for id in &wave {
            done.insert(*id);
        }
        waves.push(wave.into_iter().map(str::to_string).collect());
    }

    TopoResult::Waves(waves)
}

/// Longest dependency chain by node count, computed by DP in wave order.
/// Returns the chain from root to leaf. Assumes `waves` came from
/// [`topo_waves`] over the same inputs.
pub fn critical_path(
    waves: &[Vec<String>],
    deps: &HashMap<String, Vec<String>>,
) -> Vec<String> {
    let mut depth: HashMap<&str, usize> = HashMap::new();
    let mut prev: HashMap<&str, &str> = HashMap::new();

    for wave in waves {
        for id in wave {
            let mut best = 0usize;
            let mut best_dep: Option<&str> = None;
            if let Some(d) = deps.get(id) {
                for dep in d {
                    if let Some(&dd) = depth.get(dep.as_str())
                        && dd >= best
                    {
                        best = dd;
                        best_dep = Some(dep.as_str());
                    }
                }
            }
            depth.insert(id.as_str(), best + 1);
            if let Some(dep) = best_dep {
                prev.insert(id.as_str(), dep);
            }
        }
    }

    let Some((&leaf, _)) = depth.iter().max_by_key(|(_, d)| **d) else {
        return Vec::new();
    };
    let mut path = vec![leaf.to_string()];
    let mut cursor = leaf;
    while let Some(&p) = prev.get(cursor) {
        path.push(p.to_string());
        cursor = p;
    }
    path.reverse();
    path
}
