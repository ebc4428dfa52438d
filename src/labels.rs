use rand::Rng;

use crate::aggregate::fisher_yates;

/// Spreadsheet-style letter sequence: A..Z, AA, AB, …
fn alpha(index: usize) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        n -= 1;
        out.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_else(|_| "A".to_string())
}

pub fn response_label(index: usize) -> String {
    format!("Response {}", alpha(index))
}

pub fn model_label(index: usize) -> String {
    format!("Model {}", alpha(index))
}

/// Bijection from opaque label (`Response A`, …) to model id.
///
/// Constructed once per anonymization boundary. The map never leaves the
/// runner that built it — only `{label, payload}` pairs are emitted until a
/// winner is declared.
#[derive(Debug, Clone)]
pub struct LabelMap {
    entries: Vec<(String, String)>,
}

impl LabelMap {
    /// Labels assigned in the given model order.
    pub fn new<S: AsRef<str>>(models: &[S]) -> Self {
        let entries = models
            .iter()
            .enumerate()
            .map(|(i, m)| (response_label(i), m.as_ref().to_string()))
            .collect();
        Self { entries }
    }

    /// Labels assigned over a fresh uniform permutation of the models.
    /// Used for second-round maps that must defeat position bias.
    pub fn shuffled<S: AsRef<str>, R: Rng>(models: &[S], rng: &mut R) -> Self {
        let mut order: Vec<String> = models.iter().map(|m| m.as_ref().to_string()).collect();
        fisher_yates(&mut order, rng);
        Self::new(&order)
    }

    pub fn model_for(&self, label: &str) -> Option<&str> {
        let label = label.trim();
        self.entries
            .iter()
            .find(|(l, _)| l.eq_ignore_ascii_case(label))
            .map(|(_, m)| m.as_str())
    }

    pub fn label_for(&self, model: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, m)| m == model)
            .map(|(l, _)| l.as_str())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(l, m)| (l.as_str(), m.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
