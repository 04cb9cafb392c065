use std::cmp::Ordering;

use crate::index::{SearchIndex, Term};

pub const DEFAULT_MAX_SUGGESTIONS: usize = 5;

/// Minimum similarity for a non-prefix term to be suggested.
pub const SIMILARITY_CUTOFF: f64 = 0.75;

/// Vocabulary terms starting with `query` (vocabulary order), then terms
/// similar to it (most similar first), at most `max` in total.
pub fn suggest<'a, I>(vocabulary: I, query: &str, max: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a Term>,
{
    let query = query.trim().to_lowercase();
    if query.is_empty() || max == 0 {
        return Vec::new();
    }

    let mut prefixed: Vec<&str> = Vec::new();
    let mut close: Vec<(f64, &str)> = Vec::new();
    for term in vocabulary {
        if term.starts_with(query.as_str()) {
            if prefixed.len() < max {
                prefixed.push(term.as_str());
            }
        } else {
            let score = similarity(&query, term);
            if score >= SIMILARITY_CUTOFF {
                close.push((score, term.as_str()));
            }
        }
    }
    close.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal).then_with(|| a.1.cmp(b.1)));

    prefixed
        .into_iter()
        .chain(close.into_iter().map(|(_, t)| t))
        .take(max)
        .map(str::to_string)
        .collect()
}

/// `1 - distance / longer length`, in `[0, 1]`.
fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Single rolling row.
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for i in 1..=a.len() {
        let mut diag = row[0];
        row[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let next = (row[j] + 1).min(row[j - 1] + 1).min(diag + cost);
            diag = row[j];
            row[j] = next;
        }
    }
    row[b.len()]
}

impl SearchIndex {
    pub fn suggest(&self, query: &str, max: usize) -> Vec<String> {
        suggest(self.inverted().terms(), query, max)
    }
}
