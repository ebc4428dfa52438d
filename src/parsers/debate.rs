use serde::{Deserialize, Serialize};

use crate::parsers::{clean_line, value_after};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Revise,
    Stand,
    Merge,
}

impl Decision {
    fn parse(raw: &str) -> Option<Self> {
        let token = raw.trim().trim_matches('*').to_uppercase();
        if token.starts_with("REVISE") {
            Some(Self::Revise)
        } else if token.starts_with("STAND") {
            Some(Self::Stand)
        } else if token.starts_with("MERGE") {
            Some(Self::Merge)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revise => "REVISE",
            Self::Stand => "STAND",
            Self::Merge => "MERGE",
        }
    }
}

/// Outcome of one debater's revision step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Revision {
    pub decision: Decision,
    /// The body carried into round 2. STAND (and parse failure) keep the
    /// original response.
    pub revised: String,
    pub parse_success: bool,
}

/// Parse a `DECISION: REVISE|STAND|MERGE` line followed by the revised body.
/// On parse failure the original response is carried forward unchanged.
pub fn parse_revision(text: &str, original: &str) -> Revision {
    let decision_line = text
        .lines()
        .position(|l| value_after(l, "DECISION").is_some());

    let Some(idx) = decision_line else {
        return Revision {
            decision: Decision::Stand,
            revised: original.to_string(),
            parse_success: false,
        };
    };

    let raw = text
        .lines()
        .nth(idx)
        .and_then(|l| value_after(l, "DECISION"))
        .unwrap_or_default();
    let Some(decision) = Decision::parse(&raw) else {
        return Revision {
            decision: Decision::Stand,
            revised: original.to_string(),
            parse_success: false,
        };
    };

    if decision == Decision::Stand {
        return Revision {
            decision,
            revised: original.to_string(),
            parse_success: true,
        };
    }

    // Revised body: everything after the decision line, minus an optional
    // `REVISED RESPONSE:` header.
    let body: String = text
        .lines()
        .skip(idx + 1)
        .skip_while(|l| {
            let cleaned = clean_line(l).to_uppercase();
            cleaned.is_empty() || cleaned.starts_with("REVISED RESPONSE")
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    if body.is_empty() {
        // Decision parsed but no body followed — carry the original.
        return Revision {
            decision,
            revised: original.to_string(),
            parse_success: false,
        };
    }

    Revision {
        decision,
        revised: body,
        parse_success: true,
    }
}
