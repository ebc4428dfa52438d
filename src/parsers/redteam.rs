use serde::{Deserialize, Serialize};

use crate::parsers::{first_value, numbered_blocks};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Unknown severities coerce to MEDIUM, never to an "unknown" bucket.
    pub fn parse_or_default(raw: &str) -> Self {
        let token = raw.trim().trim_matches('*').to_uppercase();
        if token.starts_with("CRITICAL") {
            Self::Critical
        } else if token.starts_with("HIGH") {
            Self::High
        } else if token.starts_with("LOW") {
            Self::Low
        } else {
            Self::Medium
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

/// One attacker finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub number: usize,
    pub title: String,
    pub severity: Severity,
    pub detail: String,
}

/// Extract `FINDING n:` blocks with a `Severity:` field in each body.
pub fn parse_findings(text: &str) -> Vec<Finding> {
    numbered_blocks(text, "FINDING")
        .into_iter()
        .map(|b| {
            let severity = first_value(&b.body, "SEVERITY")
                .map(|v| Severity::parse_or_default(&v))
                .unwrap_or(Severity::Medium);
            Finding {
                number: b.number,
                title: b.header,
                severity,
                detail: b.body,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DefenseVerdict {
    Accept,
    Rebut,
}

impl DefenseVerdict {
    /// Default REBUT: an unaddressed finding must not be silently accepted.
    pub fn parse_or_default(raw: &str) -> Self {
        let token = raw.trim().trim_matches('*').to_uppercase();
        if token.starts_with("ACCEPT") {
            Self::Accept
        } else {
            Self::Rebut
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "ACCEPT",
            Self::Rebut => "REBUT",
        }
    }
}

/// Defender's response to one finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defense {
    pub finding_number: usize,
    pub verdict: DefenseVerdict,
    /// Revised body accompanying an ACCEPT; replaces the working content.
    pub revised: Option<String>,
    pub rationale: String,
}

/// Extract `RESPONSE TO FINDING n:` blocks. A finding with no matching
/// response defaults to REBUT at the call site.
pub fn parse_defenses(text: &str) -> Vec<Defense> {
    numbered_blocks(text, "RESPONSE TO FINDING")
        .into_iter()
        .map(|b| {
            let verdict = first_value(&b.body, "VERDICT")
                .map(|v| DefenseVerdict::parse_or_default(&v))
                .unwrap_or(DefenseVerdict::Rebut);
            let revised = revised_body(&b.body);
            Defense {
                finding_number: b.number,
                verdict,
                revised,
                rationale: b.body,
            }
        })
        .collect()
}

/// Body after a `REVISED:` marker line, if present.
fn revised_body(body: &str) -> Option<String> {
    let mut out: Vec<String> = Vec::new();
    let mut found = false;
    for line in body.lines() {
        if found {
            out.push(line.to_string());
        } else if let Some(rest) = crate::parsers::value_after(line, "REVISED") {
            found = true;
            if !rest.is_empty() {
                out.push(rest);
            }
        }
    }
    if !found {
        return None;
    }
    let trimmed = out.join("\n").trim().to_string();
    (!trimmed.is_empty()).then_some(trimmed)
}
