use crate::parsers::{response_tokens, value_after};

/// Extract a ballot from a voter's reply.
///
/// Primary: the last `VOTE: Response X` line (voters are instructed to end
/// with it). Fallback: the last `Response X` token anywhere. Default: None —
/// an unparseable ballot is simply not counted.
pub fn parse_vote(text: &str) -> Option<String> {
    let primary = text
        .lines()
        .filter_map(|l| value_after(l, "VOTE"))
        .next_back();
    if let Some(raw) = primary {
        let tokens = response_tokens(&raw);
        if let Some(label) = tokens.into_iter().next() {
            return Some(label);
        }
    }
    response_tokens(text).into_iter().next_back()
}
