use std::collections::BTreeSet;

use crate::error::QueryError;
use crate::index::{DocId, PositionalIndex, Position, Term};
use crate::tokenizer::{split_words, Normalizer};

/// Added to the user's `k` to get the inclusive distance bound. Two terms
/// match when the absolute difference of their positions is at most
/// `k + PROXIMITY_WINDOW_SLACK`, i.e. at most `k`.
pub const PROXIMITY_WINDOW_SLACK: u64 = 0;

pub fn window_bound(k: u64) -> u64 {
    k.saturating_add(PROXIMITY_WINDOW_SLACK)
}

/// `left right / k`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProximityQuery {
    left: Option<Term>,
    right: Option<Term>,
    k: u64,
    raw_terms: Vec<String>,
}

impl ProximityQuery {
    /// The left side must hold exactly two whitespace separated terms. A term
    /// that does not reduce to a single indexable word (`state-of-the-art`, a
    /// stopword) is kept but matches nothing.
    pub fn parse(text: &str, normalizer: &Normalizer) -> Result<Self, QueryError> {
        let mut parts = text.split('/');
        let (Some(lhs), Some(rhs), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(QueryError::InvalidProximityFormat("expected exactly one '/'".into()));
        };
        let terms: Vec<&str> = lhs.split_whitespace().collect();
        let &[left, right] = terms.as_slice() else {
            return Err(QueryError::InvalidProximityFormat(format!(
                "expected two terms before '/', found {}",
                terms.len()
            )));
        };
        let rhs = rhs.trim();
        let k = rhs.parse::<u64>().map_err(|_| {
            QueryError::InvalidProximityFormat(format!("window {rhs:?} is not a non-negative integer"))
        })?;
        let mut raw_terms = split_words(left);
        raw_terms.extend(split_words(right));
        Ok(Self {
            left: resolve_term(left, normalizer),
            right: resolve_term(right, normalizer),
            k,
            raw_terms,
        })
    }

    pub fn raw_terms(&self) -> &[String] {
        &self.raw_terms
    }

    pub fn evaluate(&self, index: &PositionalIndex) -> BTreeSet<DocId> {
        let (Some(left), Some(right)) = (&self.left, &self.right) else {
            return BTreeSet::new();
        };
        let (Some(mut a), Some(mut b)) = (index.get(left), index.get(right)) else {
            return BTreeSet::new();
        };
        // Distance is symmetric; walk the smaller posting map.
        if a.len() > b.len() {
            std::mem::swap(&mut a, &mut b);
        }
        let bound = window_bound(self.k);
        a.iter()
            .filter_map(|(doc_id, pa)| {
                let pb = b.get(doc_id)?;
                within_window(pa, pb, bound).then(|| doc_id.clone())
            })
            .collect()
    }
}

fn resolve_term(term: &str, normalizer: &Normalizer) -> Option<Term> {
    match split_words(term).as_slice() {
        [word] => normalizer.normalize_term(word),
        _ => None,
    }
}

/// Two-pointer scan over sorted position lists; stops at the first pair
/// no further apart than `bound`.
pub fn within_window(a: &[Position], b: &[Position], bound: u64) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (x, y) = (a[i], b[j]);
        if u64::from(x.abs_diff(y)) <= bound {
            return true;
        }
        if x < y {
            i += 1;
        } else {
            j += 1;
        }
    }
    false
}
