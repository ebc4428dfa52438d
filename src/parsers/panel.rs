use serde::{Deserialize, Serialize};

use crate::parsers::{bounded_score, clean_line, dash_items, numbered_blocks};

/// One specialist's structured report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialistReport {
    /// Criterion → 1–10 assessment from the report's criterion table.
    pub criteria: Vec<(String, f64)>,
    /// Up to three `RECOMMENDATION n:` entries, in stated priority order.
    pub recommendations: Vec<String>,
    /// Dash-items under a `KEY FINDINGS:` heading.
    pub key_findings: Vec<String>,
}

/// Parse a specialist's reply. All three sections are independent — a
/// report missing one still contributes the others.
pub fn parse_report(text: &str) -> SpecialistReport {
    let criteria = criterion_table(text);

    let recommendations: Vec<String> = numbered_blocks(text, "RECOMMENDATION")
        .into_iter()
        .take(3)
        .map(|b| {
            if b.body.is_empty() {
                b.header
            } else if b.header.is_empty() {
                b.body
            } else {
                format!("{}\n{}", b.header, b.body)
            }
        })
        .collect();

    let key_findings = section_items(text, "KEY FINDINGS");

    SpecialistReport {
        criteria,
        recommendations,
        key_findings,
    }
}

/// Markdown table rows `| criterion | score |`; separator and header rows
/// are skipped by the score-range check.
fn criterion_table(text: &str) -> Vec<(String, f64)> {
    let mut out = Vec::new();
    for line in text.lines() {
        if !line.contains('|') {
            continue;
        }
        let cells: Vec<String> = line
            .split('|')
            .map(|c| c.trim().trim_matches('*').trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if cells.len() >= 2
            && let Some(score) = bounded_score(&cells[1], 1.0, 10.0)
            && !cells[0].chars().all(|c| c == '-' || c == ':')
        {
            out.push((cells[0].clone(), score));
        }
    }
    out
}

/// Dash-items between a heading line and the next heading/blank gap.
fn section_items(text: &str, heading: &str) -> Vec<String> {
    let mut in_section = false;
    let mut collected = String::new();
    for line in text.lines() {
        let cleaned = clean_line(line).to_uppercase();
        if cleaned.starts_with(heading) {
            in_section = true;
            continue;
        }
        if in_section {
            let t = line.trim();
            // Section ends at the next heading-looking line.
            if !t.is_empty() && !t.starts_with('-') && !t.starts_with('*') && t.ends_with(':') {
                break;
            }
            collected.push_str(line);
            collected.push('\n');
        }
    }
    dash_items(&collected)
}
