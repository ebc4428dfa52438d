//! Structured-text parsers over free-form model output.
//!
//! Every parser is pure and total: it never raises, and when both the
//! primary pattern (the explicitly instructed format) and the fallback
//! pattern fail, it returns a documented conservative default. All parsers
//! tolerate leading/trailing whitespace, `**bold**` around keywords, mixed
//! case, narrative before the structured section, and truncation after it.

pub mod claims;
pub mod confidence;
pub mod debate;
pub mod delphi;
pub mod ideas;
pub mod jury;
pub mod outline;
pub mod panel;
pub mod ranking;
pub mod redteam;
pub mod review;
pub mod tasks;
pub mod tournament;
pub mod vote;

/// Strip markdown emphasis and bullet/heading furniture from a line so
/// keyword prefixes match regardless of decoration.
pub(crate) fn clean_line(line: &str) -> String {
    line.trim()
        .trim_start_matches(['#', '>', '-', '*', ' ', '\t'])
        .replace("**", "")
        .replace("__", "")
        .trim()
        .to_string()
}

/// If `line` (after cleaning) starts with `keyword` followed by a colon,
/// return the value after the colon.
pub(crate) fn value_after(line: &str, keyword: &str) -> Option<String> {
    let cleaned = clean_line(line);
    let (head, rest) = cleaned.split_at_checked(keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = rest.trim_start();
    let rest = rest.strip_prefix(':')?;
    Some(rest.trim().trim_matches('*').trim().to_string())
}

/// First line carrying `KEYWORD: value`.
pub(crate) fn first_value(text: &str, keyword: &str) -> Option<String> {
    text.lines().find_map(|l| value_after(l, keyword))
}

/// Last line carrying `KEYWORD: value` — used where models are instructed
/// to end with the marker, so trailing occurrences win.
pub(crate) fn last_value(text: &str, keyword: &str) -> Option<String> {
    text.lines().filter_map(|l| value_after(l, keyword)).next_back()
}

/// Scan for `Response X` tokens (any case, optional bold) and return the
/// canonical labels in order of appearance.
pub(crate) fn response_tokens(text: &str) -> Vec<String> {
    let stripped = text.replace("**", "");
    // ASCII-only lowering keeps byte offsets aligned with `stripped`.
    let lower = stripped.to_ascii_lowercase();
    let mut out = Vec::new();
    let mut search = 0usize;
    while let Some(pos) = lower[search..].find("response ") {
        let start = search + pos;
        let at = start + "response ".len();
        // Word boundary: skip matches inside e.g. "responses" narrative.
        let at_boundary = start == 0
            || !stripped[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric());
        let letters: String = stripped[at..]
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_uppercase();
        // Labels are single letters; longer words are narrative.
        if at_boundary && letters.len() == 1 {
            out.push(format!("Response {letters}"));
        }
        search = at;
    }
    out
}

/// A numbered block: `PREFIX n:` header plus the lines up to the next
/// block header (or end of text).
#[derive(Debug, Clone)]
pub(crate) struct NumberedBlock {
    pub number: usize,
    /// Remainder of the header line after the colon.
    pub header: String,
    /// Body lines, joined verbatim.
    pub body: String,
}

/// Extract `PREFIX n:` blocks. The number may be decorated (`PREFIX 2:`,
/// `**PREFIX 3:**`); narrative before the first block is ignored.
pub(crate) fn numbered_blocks(text: &str, prefix: &str) -> Vec<NumberedBlock> {
    let mut blocks: Vec<NumberedBlock> = Vec::new();
    for line in text.lines() {
        if let Some((number, header)) = parse_block_header(line, prefix) {
            blocks.push(NumberedBlock {
                number,
                header,
                body: String::new(),
            });
        } else if let Some(current) = blocks.last_mut() {
            if !current.body.is_empty() {
                current.body.push('\n');
            }
            current.body.push_str(line);
        }
    }
    for b in &mut blocks {
        b.body = b.body.trim().to_string();
    }
    blocks
}

/// Match `PREFIX <n>:` at the start of a cleaned line.
pub(crate) fn parse_block_header(line: &str, prefix: &str) -> Option<(usize, String)> {
    let cleaned = clean_line(line);
    let (head, rest) = cleaned.split_at_checked(prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let rest = rest.trim_start().trim_start_matches(['_', '#']);
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let number = digits.parse().ok()?;
    let after = rest[digits.len()..].trim_start();
    let header = after.strip_prefix(':').map(str::trim).unwrap_or("");
    Some((number, header.trim_matches('*').trim().to_string()))
}

/// Parse a score constrained to `[lo, hi]`. Accepts `8`, `8/10`, `8.5`,
/// bold decoration. Out-of-range values are rejected, not clamped.
pub(crate) fn bounded_score(raw: &str, lo: f64, hi: f64) -> Option<f64> {
    let cleaned = raw.trim().trim_matches('*').trim();
    let head = cleaned.split('/').next()?.trim();
    let number: String = head
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    let value: f64 = number.parse().ok()?;
    (lo..=hi).contains(&value).then_some(value)
}

/// First signed or decimal number anywhere in the text. Commas inside
/// digit groups are tolerated (`1,200` → 1200).
pub(crate) fn first_number(text: &str) -> Option<f64> {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        let c = chars[i];
        let starts_number = c.is_ascii_digit()
            || (c == '-'
                && chars
                    .get(i + 1)
                    .is_some_and(|n| n.is_ascii_digit() || *n == '.'))
            || (c == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()));
        if starts_number {
            let mut token = String::new();
            let mut j = i;
            while j < chars.len() {
                let c = chars[j];
                if c.is_ascii_digit() || c == '.' || (j == i && c == '-') {
                    token.push(c);
                } else if c == ',' && chars.get(j + 1).is_some_and(|n| n.is_ascii_digit()) {
                    // thousands separator
                } else {
                    break;
                }
                j += 1;
            }
            if let Ok(v) = token.parse::<f64>() {
                return Some(v);
            }
            i = j;
        } else {
            i += 1;
        }
    }
    None
}

/// Split a comma-separated value list, dropping empties.
pub(crate) fn csv_items(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_matches('*').trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Dash-items (`- foo`) under the rest of a block body.
pub(crate) fn dash_items(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|l| {
            let t = l.trim();
            t.strip_prefix('-')
                .or_else(|| t.strip_prefix('*'))
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty())
        .collect()
}
