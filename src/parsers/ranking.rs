use crate::labels::LabelMap;
use crate::parsers::{clean_line, response_tokens};

/// Extract an ordered ranking of anonymized labels from a rater's reply.
///
/// Primary: a `FINAL RANKING:` marker followed by a numbered list of labels.
/// Fallback: every `Response X` token in order of appearance. Either way the
/// result is deduplicated and restricted to labels present in `map`.
pub fn parse_ranking(text: &str, map: &LabelMap) -> Vec<String> {
    let ordered = ranking_block(text).unwrap_or_else(|| response_tokens(text));

    let mut seen = std::collections::HashSet::new();
    ordered
        .into_iter()
        .filter(|l| map.model_for(l).is_some())
        .filter(|l| seen.insert(l.clone()))
        .collect()
}

/// Labels listed after a `FINAL RANKING:` line, in list order.
fn ranking_block(text: &str) -> Option<Vec<String>> {
    let mut lines = text.lines();
    lines.by_ref().find(|l| {
        let cleaned = clean_line(l).to_uppercase();
        cleaned.starts_with("FINAL RANKING")
    })?;

    let tail: Vec<&str> = lines.collect();
    let labels = response_tokens(&tail.join("\n"));
    if labels.is_empty() { None } else { Some(labels) }
}

/// Mean position received per model across raters, lower is better.
/// Models never ranked by any rater are absent. Rounded to 0.01 and sorted
/// ascending (ties broken by model id for determinism).
pub fn aggregate_rankings(rankings: &[Vec<String>], map: &LabelMap) -> Vec<(String, f64)> {
    use std::collections::HashMap;

    let mut positions: HashMap<&str, Vec<usize>> = HashMap::new();
    for ranking in rankings {
        for (idx, label) in ranking.iter().enumerate() {
            if let Some(model) = map.model_for(label) {
                positions.entry(model).or_default().push(idx + 1);
            }
        }
    }

    let mut out: Vec<(String, f64)> = positions
        .into_iter()
        .map(|(model, ps)| {
            let mean = ps.iter().sum::<usize>() as f64 / ps.len() as f64;
            (model.to_string(), crate::aggregate::round2(mean))
        })
        .collect();
    out.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    out
}
