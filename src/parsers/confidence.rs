use serde::{Deserialize, Serialize};

use crate::parsers::{clean_line, first_number, last_value};

/// A parsed self-assessed confidence in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ParsedConfidence {
    pub value: f64,
    pub parsed_successfully: bool,
}

/// Extract a `CONFIDENCE:` value. Accepts `0.82`, `.82`, `82%`, `82`,
/// `1.0`, `0`. Values in (1, 100] are treated as percentages and divided
/// by 100; everything is clamped to [0, 1]. Default 0.5 when no value
/// parses.
pub fn parse_confidence(text: &str) -> ParsedConfidence {
    let raw = last_value(text, "CONFIDENCE");
    let number = raw.as_deref().and_then(first_number);
    match number {
        Some(v) => {
            let v = if v > 1.0 && v <= 100.0 { v / 100.0 } else { v };
            ParsedConfidence {
                value: v.clamp(0.0, 1.0),
                parsed_successfully: true,
            }
        }
        None => ParsedConfidence {
            value: 0.5,
            parsed_successfully: false,
        },
    }
}

/// Synthesizer output, split at the instructed markers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisParts {
    pub synthesis: String,
    pub calibration_notes: Option<String>,
}

/// Split `SYNTHESIS:` / `CONFIDENCE CALIBRATION NOTES:` sections. Fallback
/// treats the entire body as the synthesis.
pub fn parse_synthesis(text: &str) -> SynthesisParts {
    let mut synthesis: Vec<&str> = Vec::new();
    let mut notes: Vec<&str> = Vec::new();
    let mut section = 0u8; // 0 = preamble, 1 = synthesis, 2 = notes

    for line in text.lines() {
        let cleaned = clean_line(line).to_uppercase();
        if cleaned.starts_with("SYNTHESIS") && (cleaned.len() == 9 || cleaned.as_bytes()[9] == b':')
        {
            section = 1;
            continue;
        }
        if cleaned.starts_with("CONFIDENCE CALIBRATION NOTES") {
            section = 2;
            continue;
        }
        match section {
            1 => synthesis.push(line),
            2 => notes.push(line),
            _ => {}
        }
    }

    let synthesis_text = synthesis.join("\n").trim().to_string();
    let notes_text = notes.join("\n").trim().to_string();

    if synthesis_text.is_empty() {
        // No markers — the whole body is the synthesis.
        return SynthesisParts {
            synthesis: text.trim().to_string(),
            calibration_notes: (!notes_text.is_empty()).then_some(notes_text),
        };
    }

    SynthesisParts {
        synthesis: synthesis_text,
        calibration_notes: (!notes_text.is_empty()).then_some(notes_text),
    }
}
