use std::collections::BTreeSet;

use crate::error::QueryError;
use crate::index::{DocId, InvertedIndex, Term};
use crate::tokenizer::{split_words, Normalizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    And,
    Or,
    Not,
}

impl BooleanOp {
    /// Operator keywords are matched on the lowercased word and never stemmed.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "and" => Some(BooleanOp::And),
            "or" => Some(BooleanOp::Or),
            "not" => Some(BooleanOp::Not),
            _ => None,
        }
    }
}

/// `term (op term)*`, evaluated strictly left to right with no precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanQuery {
    // `None` marks a stopword: it can never be indexed, so it matches nothing.
    terms: Vec<Option<Term>>,
    ops: Vec<BooleanOp>,
    raw_terms: Vec<String>,
}

impl BooleanQuery {
    pub fn parse(text: &str, normalizer: &Normalizer) -> Result<Self, QueryError> {
        let words = split_words(text);
        if words.is_empty() {
            return Err(QueryError::MalformedQuery("query is empty".into()));
        }

        let mut terms = Vec::with_capacity(words.len() / 2 + 1);
        let mut ops = Vec::with_capacity(words.len() / 2);
        let mut raw_terms = Vec::with_capacity(words.len() / 2 + 1);
        for (i, word) in words.iter().enumerate() {
            let op = BooleanOp::from_keyword(word);
            if i % 2 == 0 {
                if op.is_some() {
                    return Err(QueryError::MalformedQuery(format!(
                        "expected a term at position {i}, found operator {word:?}"
                    )));
                }
                terms.push(normalizer.normalize_term(word));
                raw_terms.push(word.clone());
            } else {
                match op {
                    Some(op) => ops.push(op),
                    None => {
                        return Err(QueryError::MalformedQuery(format!(
                            "expected AND, OR or NOT at position {i}, found {word:?}"
                        )))
                    }
                }
            }
        }
        if words.len() % 2 == 0 {
            return Err(QueryError::MalformedQuery(format!(
                "query ends with an operator ({} tokens)",
                words.len()
            )));
        }
        Ok(Self { terms, ops, raw_terms })
    }

    pub fn terms(&self) -> &[Option<Term>] {
        &self.terms
    }

    pub fn ops(&self) -> &[BooleanOp] {
        &self.ops
    }

    /// Query words as typed (lowercased), without operators.
    pub fn raw_terms(&self) -> &[String] {
        &self.raw_terms
    }

    pub fn evaluate(&self, index: &InvertedIndex) -> BTreeSet<DocId> {
        let empty = BTreeSet::new();
        let lookup = |term: &Option<Term>| term.as_deref().and_then(|t| index.get(t)).unwrap_or(&empty);

        let mut result = match self.terms.first() {
            Some(first) => lookup(first).clone(),
            None => return BTreeSet::new(),
        };
        for (op, term) in self.ops.iter().zip(&self.terms[1..]) {
            let next = lookup(term);
            match op {
                BooleanOp::And => result.retain(|d| next.contains(d)),
                BooleanOp::Or => result.extend(next.iter().cloned()),
                BooleanOp::Not => result.retain(|d| !next.contains(d)),
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build;
    use std::collections::BTreeSet;

    fn stops(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn ids(ns: &[u64]) -> BTreeSet<DocId> {
        ns.iter().map(|n| DocId::Numeric(*n)).collect()
    }

    fn sample() -> (InvertedIndex, Normalizer) {
        let normalizer = Normalizer::with_stopwords(stops(&["the"]), false);
        let index = build(
            vec![
                (DocId::Numeric(1), "a b"),
                (DocId::Numeric(2), "b c"),
                (DocId::Numeric(3), "c"),
                (DocId::Numeric(4), "a"),
            ],
            &normalizer,
        );
        (index.inverted().clone(), normalizer)
    }

    fn eval(q: &str) -> BTreeSet<DocId> {
        let (index, normalizer) = sample();
        BooleanQuery::parse(q, &normalizer).unwrap().evaluate(&index)
    }

    #[test]
    fn operators_fold_left_to_right() {
        // (a AND b) OR c = {1} ∪ {2, 3}
        assert_eq!(eval("a AND b OR c"), ids(&[1, 2, 3]));
        // With AND binding tighter this would be c ∪ (b ∩ a) = {1, 2, 3}.
        assert_eq!(eval("c OR b AND a"), ids(&[1]));
    }

    #[test]
    fn not_is_binary_difference() {
        assert_eq!(eval("a NOT b"), ids(&[4]));
        assert_eq!(eval("b not a or c"), ids(&[2, 3]));
    }

    #[test]
    fn unknown_terms_are_empty() {
        assert!(eval("zzz").is_empty());
        assert_eq!(eval("zzz OR a"), ids(&[1, 4]));
    }

    #[test]
    fn stopword_term_keeps_alternation() {
        assert_eq!(eval("the OR c"), ids(&[2, 3]));
    }

    #[test]
    fn rejects_broken_alternation() {
        let n = Normalizer::default();
        for q in ["", "  ,, ", "a AND", "a b", "AND a", "a AND OR b", "a and b or"] {
            assert!(
                matches!(BooleanQuery::parse(q, &n), Err(QueryError::MalformedQuery(_))),
                "{q:?} should be malformed"
            );
        }
    }

    #[test]
    fn operators_are_not_stemmed() {
        let q = BooleanQuery::parse("Networks AND running", &Normalizer::default()).unwrap();
        assert_eq!(q.ops(), &[BooleanOp::And]);
        assert_eq!(q.terms(), &[Some("network".to_string()), Some("run".to_string())]);
        assert_eq!(q.raw_terms(), &["networks".to_string(), "running".to_string()]);
    }
}
