//! Query parsing and evaluation.
//!
//! A query containing `/` is a proximity query (`termA termB / k`); anything
//! else is a boolean query (`term (AND|OR|NOT term)*`). Both are normalized
//! with the index's own [`Normalizer`], so query terms stem and filter exactly
//! as the indexed text did.

pub mod boolean;
pub mod proximity;

pub use boolean::{BooleanOp, BooleanQuery};
pub use proximity::{window_bound, within_window, ProximityQuery, PROXIMITY_WINDOW_SLACK};

use serde::Serialize;
use std::collections::BTreeSet;

use crate::error::QueryError;
use crate::index::{DocId, SearchIndex};
use crate::tokenizer::Normalizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Boolean,
    Proximity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Boolean(BooleanQuery),
    Proximity(ProximityQuery),
}

impl Query {
    pub fn parse(text: &str, normalizer: &Normalizer) -> Result<Self, QueryError> {
        if text.contains('/') {
            ProximityQuery::parse(text, normalizer).map(Query::Proximity)
        } else {
            BooleanQuery::parse(text, normalizer).map(Query::Boolean)
        }
    }

    pub fn kind(&self) -> QueryKind {
        match self {
            Query::Boolean(_) => QueryKind::Boolean,
            Query::Proximity(_) => QueryKind::Proximity,
        }
    }

    pub fn evaluate(&self, index: &SearchIndex) -> BTreeSet<DocId> {
        match self {
            Query::Boolean(q) => q.evaluate(index.inverted()),
            Query::Proximity(q) => q.evaluate(index.positional()),
        }
    }

    /// Words worth highlighting in result snippets (no operators, not stemmed).
    pub fn highlight_terms(&self) -> &[String] {
        match self {
            Query::Boolean(q) => q.raw_terms(),
            Query::Proximity(q) => q.raw_terms(),
        }
    }
}

/// Matching documents in ascending [`DocId`] order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchOutcome {
    pub kind: QueryKind,
    pub doc_ids: Vec<DocId>,
    #[serde(skip)]
    pub highlight_terms: Vec<String>,
}

impl SearchIndex {
    pub fn search(&self, text: &str) -> Result<SearchOutcome, QueryError> {
        let query = Query::parse(text, &self.normalizer)?;
        let doc_ids: Vec<DocId> = query.evaluate(self).into_iter().collect();
        tracing::debug!(query = text, kind = ?query.kind(), hits = doc_ids.len(), "evaluated query");
        Ok(SearchOutcome {
            kind: query.kind(),
            doc_ids,
            highlight_terms: query.highlight_terms().to_vec(),
        })
    }
}
