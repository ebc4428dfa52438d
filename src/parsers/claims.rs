use serde::{Deserialize, Serialize};

use crate::parsers::{clean_line, first_number, first_value, numbered_blocks};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClaimType {
    Statistic,
    Date,
    Attribution,
    Technical,
    Comparison,
    Causal,
}

impl ClaimType {
    fn parse(raw: &str) -> Option<Self> {
        let token = raw.trim().trim_matches('*').to_uppercase();
        [
            ("STATISTIC", Self::Statistic),
            ("DATE", Self::Date),
            ("ATTRIBUTION", Self::Attribution),
            ("TECHNICAL", Self::Technical),
            ("COMPARISON", Self::Comparison),
            ("CAUSAL", Self::Causal),
        ]
        .into_iter()
        .find(|(name, _)| token.starts_with(name))
        .map(|(_, t)| t)
    }
}

/// One extracted verifiable claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub number: usize,
    pub text: String,
    pub context: String,
    pub claim_type: Option<ClaimType>,
}

/// Extract `CLAIM n:` blocks with `Context` and `Type` fields, then
/// deduplicate by exact claim text.
pub fn parse_claims(text: &str) -> Vec<Claim> {
    let mut seen = std::collections::HashSet::new();
    numbered_blocks(text, "CLAIM")
        .into_iter()
        .filter_map(|b| {
            let claim_text = if b.header.is_empty() {
                first_value(&b.body, "CLAIM").unwrap_or_default()
            } else {
                b.header.clone()
            };
            if claim_text.is_empty() || !seen.insert(claim_text.clone()) {
                return None;
            }
            Some(Claim {
                number: b.number,
                text: claim_text,
                context: first_value(&b.body, "CONTEXT").unwrap_or_default(),
                claim_type: first_value(&b.body, "TYPE").and_then(|v| ClaimType::parse(&v)),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Verified,
    Disputed,
    Unverifiable,
}

impl Verdict {
    pub fn parse(raw: &str) -> Option<Self> {
        let token = raw.trim().trim_matches('*').to_uppercase();
        if token.starts_with("VERIFIED") {
            Some(Self::Verified)
        } else if token.starts_with("DISPUTED") {
            Some(Self::Disputed)
        } else if token.starts_with("UNVERIFIABLE") {
            Some(Self::Unverifiable)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "VERIFIED",
            Self::Disputed => "DISPUTED",
            Self::Unverifiable => "UNVERIFIABLE",
        }
    }
}

/// One checker's verification of one claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub claim_number: usize,
    pub verdict: Verdict,
    pub evidence: String,
    /// None when the checker wrote "N/A".
    pub correction: Option<String>,
    pub confidence: crate::parsers::delphi::ConfidenceLevel,
}

/// Extract `VERIFICATION claim_n:` blocks carrying `VERDICT`, `Evidence`,
/// `Correction (or "N/A")` and `Confidence` fields.
pub fn parse_verifications(text: &str) -> Vec<Verification> {
    verification_blocks(text)
        .into_iter()
        .filter_map(|(claim_number, body)| {
            let verdict = first_value(&body, "VERDICT")
                .and_then(|v| Verdict::parse(&v))
                // A block headed `VERIFICATION claim_1: DISPUTED` puts the
                // verdict on the header line.
                .or_else(|| Verdict::parse(body.lines().next().unwrap_or_default()))?;
            let evidence = first_value(&body, "EVIDENCE").unwrap_or_default();
            let correction = first_value(&body, "CORRECTION")
                .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("n/a"));
            let confidence = crate::parsers::delphi::parse_confidence_level(&body);
            Some(Verification {
                claim_number,
                verdict,
                evidence,
                correction,
                confidence,
            })
        })
        .collect()
}

/// Blocks headed `VERIFICATION claim_<n>:`; the header remainder is folded
/// into the body so a verdict stated inline still parses.
fn verification_blocks(text: &str) -> Vec<(usize, String)> {
    let mut blocks: Vec<(usize, Vec<String>)> = Vec::new();
    for line in text.lines() {
        if let Some((number, header)) = verification_header(line) {
            blocks.push((number, vec![header]));
        } else if let Some((_, body)) = blocks.last_mut() {
            body.push(line.to_string());
        }
    }
    blocks
        .into_iter()
        .map(|(n, body)| (n, body.join("\n").trim().to_string()))
        .collect()
}

fn verification_header(line: &str) -> Option<(usize, String)> {
    let cleaned = clean_line(line);
    let rest = cleaned
        .strip_prefix("VERIFICATION")
        .or_else(|| cleaned.strip_prefix("verification"))
        .or_else(|| cleaned.strip_prefix("Verification"))?
        .trim_start();
    let ident: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    let digits: String = ident.chars().filter(|c| c.is_ascii_digit()).collect();
    let number: usize = digits.parse().ok()?;
    let after = rest[ident.len()..].trim_start();
    let header = after.strip_prefix(':').map(str::trim).unwrap_or(after);
    Some((number, header.to_string()))
}

/// `Reliability Score:` 0–100, clamped. None when the reporter omitted it.
pub fn parse_reliability_score(text: &str) -> Option<f64> {
    let raw = first_value(text, "RELIABILITY SCORE")?;
    first_number(&raw).map(|v| v.clamp(0.0, 100.0))
}
