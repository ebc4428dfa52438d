use serde::{Deserialize, Serialize};

use crate::parsers::{dash_items, first_value, numbered_blocks};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionLength {
    Short,
    Medium,
    Long,
}

impl SectionLength {
    fn parse_or_default(raw: &str) -> Self {
        let token = raw.trim().trim_matches('*').to_uppercase();
        if token.starts_with("SHORT") {
            Self::Short
        } else if token.starts_with("LONG") {
            Self::Long
        } else {
            Self::Medium
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineSection {
    pub number: usize,
    pub name: String,
    pub description: String,
    pub key_topics: Vec<String>,
    pub length: SectionLength,
    pub source_coverage: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentOutline {
    pub title: String,
    pub sections: Vec<OutlineSection>,
    /// True when zero sections parsed and the raw text was wrapped as a
    /// single "Full Document" section.
    pub fallback: bool,
}

/// Maximum sections honored from an architect outline; extras are truncated.
pub const MAX_SECTIONS: usize = 20;

/// Parse the architect's outline: `DOCUMENT TITLE:` plus `SECTION n:`
/// blocks each carrying `Description`, `Key Topics` (dash-items),
/// `Length ∈ {Short, Medium, Long}` and `Source Coverage`.
///
/// Zero parsed sections over non-empty text wraps the whole reply as one
/// "Full Document" section (`fallback = true`). Truncation to
/// [`MAX_SECTIONS`] happens here; the < 3 sections fatal policy belongs to
/// the runner.
pub fn parse_outline(text: &str, question: &str) -> DocumentOutline {
    let title = first_value(text, "DOCUMENT TITLE")
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| question.chars().take(80).collect());

    let mut sections: Vec<OutlineSection> = numbered_blocks(text, "SECTION")
        .into_iter()
        .map(|b| {
            let description = first_value(&b.body, "DESCRIPTION").unwrap_or_default();
            let key_topics = topics(&b.body);
            let length = first_value(&b.body, "LENGTH")
                .map(|v| SectionLength::parse_or_default(&v))
                .unwrap_or(SectionLength::Medium);
            let source_coverage = first_value(&b.body, "SOURCE COVERAGE").unwrap_or_default();
            OutlineSection {
                number: b.number,
                name: b.header,
                description,
                key_topics,
                length,
                source_coverage,
            }
        })
        .collect();

    if sections.is_empty() && !text.trim().is_empty() {
        return DocumentOutline {
            title,
            sections: vec![OutlineSection {
                number: 1,
                name: "Full Document".to_string(),
                description: text.trim().to_string(),
                key_topics: Vec::new(),
                length: SectionLength::Long,
                source_coverage: String::new(),
            }],
            fallback: true,
        };
    }

    if sections.len() > MAX_SECTIONS {
        tracing::warn!(
            parsed = sections.len(),
            "outline over section cap — truncating to {MAX_SECTIONS}"
        );
        sections.truncate(MAX_SECTIONS);
    }

    DocumentOutline {
        title,
        sections,
        fallback: false,
    }
}

/// `Key Topics:` followed by dash-items (same line csv also accepted).
fn topics(body: &str) -> Vec<String> {
    if let Some(inline) = first_value(body, "KEY TOPICS")
        && !inline.is_empty()
    {
        return crate::parsers::csv_items(&inline);
    }
    // Dash-items on the lines after the `Key Topics:` marker.
    let mut after_marker = false;
    let mut collected = String::new();
    for line in body.lines() {
        if crate::parsers::value_after(line, "KEY TOPICS").is_some() {
            after_marker = true;
            continue;
        }
        if after_marker {
            let t = line.trim();
            if !t.starts_with('-') && !t.starts_with('*') && !t.is_empty() {
                break;
            }
            collected.push_str(line);
            collected.push('\n');
        }
    }
    dash_items(&collected)
}
