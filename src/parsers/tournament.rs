use crate::parsers::{response_tokens, value_after};

/// Which side of a two-response matchup the judge picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchupSide {
    A,
    B,
}

impl MatchupSide {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            "Response A" => Some(Self::A),
            "Response B" => Some(Self::B),
            _ => None,
        }
    }
}

/// Extract the judge's pick. Primary: the last `WINNER: Response A|B` line.
/// Fallback: the last `Response A|B` token anywhere. None means the judge
/// retry / default-advance rules apply at the call site.
pub fn parse_matchup_winner(text: &str) -> Option<MatchupSide> {
    let primary = text
        .lines()
        .filter_map(|l| value_after(l, "WINNER"))
        .filter_map(|raw| {
            response_tokens(&raw)
                .into_iter()
                .find_map(|l| MatchupSide::from_label(&l))
        })
        .next_back();
    if primary.is_some() {
        return primary;
    }
    response_tokens(text)
        .into_iter()
        .filter_map(|l| MatchupSide::from_label(&l))
        .next_back()
}
