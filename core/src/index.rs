use anyhow::{bail, Result};
use rayon::prelude::*;
use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::BuildError;
use crate::tokenizer::Normalizer;

pub type Term = String;

/// Zero-based token offset within a document's normalized term sequence.
pub type Position = u32;

/// Stable document identifier derived from the source file name.
///
/// Ordering: every `Numeric` id sorts before every `Named` id; numerics by
/// value, names lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocId {
    Numeric(u64),
    Named(String),
}

impl DocId {
    /// `Numeric` when the file stem parses as an unsigned integer, otherwise
    /// the whole file name.
    pub fn from_file_name(file_name: &str) -> Self {
        let stem = Path::new(file_name).file_stem().and_then(|s| s.to_str());
        match stem.and_then(|s| s.parse::<u64>().ok()) {
            Some(n) => DocId::Numeric(n),
            None => DocId::Named(file_name.to_string()),
        }
    }

    /// Inverse of `to_string()`.
    pub fn from_key(key: &str) -> Self {
        match key.parse::<u64>() {
            Ok(n) => DocId::Numeric(n),
            Err(_) => DocId::Named(key.to_string()),
        }
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocId::Numeric(n) => write!(f, "{n}"),
            DocId::Named(s) => f.write_str(s),
        }
    }
}

// Compact formats can't self-describe, so they get an explicit tag.
#[derive(Serialize, Deserialize)]
enum DocIdRepr {
    Numeric(u64),
    Named(String),
}

impl Serialize for DocId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            match self {
                DocId::Numeric(n) => serializer.serialize_u64(*n),
                DocId::Named(s) => serializer.serialize_str(s),
            }
        } else {
            match self {
                DocId::Numeric(n) => DocIdRepr::Numeric(*n),
                DocId::Named(s) => DocIdRepr::Named(s.clone()),
            }
            .serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for DocId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(DocIdVisitor)
        } else {
            Ok(match DocIdRepr::deserialize(deserializer)? {
                DocIdRepr::Numeric(n) => DocId::Numeric(n),
                DocIdRepr::Named(s) => DocId::Named(s),
            })
        }
    }
}

struct DocIdVisitor;

impl<'de> Visitor<'de> for DocIdVisitor {
    type Value = DocId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an unsigned integer or a document name")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<DocId, E> {
        Ok(DocId::Numeric(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<DocId, E> {
        u64::try_from(v)
            .map(DocId::Numeric)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    // Map keys arrive as strings, so numeric keys are recovered here.
    fn visit_str<E: de::Error>(self, v: &str) -> Result<DocId, E> {
        Ok(DocId::from_key(v))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    pub file_name: String,
    pub num_tokens: u32,
}

/// Term -> documents containing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvertedIndex {
    postings: BTreeMap<Term, BTreeSet<DocId>>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, term: &str) -> Option<&BTreeSet<DocId>> {
        self.postings.get(term)
    }

    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.postings.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Term, &BTreeSet<DocId>)> {
        self.postings.iter()
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub(crate) fn insert(&mut self, term: &str, doc_id: &DocId) {
        self.postings.entry(term.to_string()).or_default().insert(doc_id.clone());
    }
}

/// Term -> document -> ordered token offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionalIndex {
    postings: BTreeMap<Term, BTreeMap<DocId, Vec<Position>>>,
}

impl PositionalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, term: &str) -> Option<&BTreeMap<DocId, Vec<Position>>> {
        self.postings.get(term)
    }

    pub fn positions(&self, term: &str, doc_id: &DocId) -> Option<&[Position]> {
        self.postings.get(term)?.get(doc_id).map(Vec::as_slice)
    }

    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.postings.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Term, &BTreeMap<DocId, Vec<Position>>)> {
        self.postings.iter()
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub(crate) fn push(&mut self, term: &str, doc_id: &DocId, position: Position) {
        self.postings
            .entry(term.to_string())
            .or_default()
            .entry(doc_id.clone())
            .or_default()
            .push(position);
    }
}

/// A fully built, immutable index pair plus the policy it was built with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchIndex {
    pub(crate) inverted: InvertedIndex,
    pub(crate) positional: PositionalIndex,
    pub(crate) docs: BTreeMap<DocId, DocMeta>,
    pub(crate) normalizer: Normalizer,
}

impl SearchIndex {
    /// Reassemble an index from persisted parts, checking cross-index invariants.
    pub fn from_parts(
        inverted: InvertedIndex,
        positional: PositionalIndex,
        docs: BTreeMap<DocId, DocMeta>,
        normalizer: Normalizer,
    ) -> Result<Self> {
        let index = Self { inverted, positional, docs, normalizer };
        index.validate()?;
        Ok(index)
    }

    pub fn inverted(&self) -> &InvertedIndex {
        &self.inverted
    }

    pub fn positional(&self) -> &PositionalIndex {
        &self.positional
    }

    pub fn docs(&self) -> &BTreeMap<DocId, DocMeta> {
        &self.docs
    }

    pub fn doc(&self, doc_id: &DocId) -> Option<&DocMeta> {
        self.docs.get(doc_id)
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn num_docs(&self) -> usize {
        self.docs.len()
    }

    pub fn num_terms(&self) -> usize {
        self.inverted.len()
    }

    /// Verify that both indexes agree term by term and that every position
    /// list is non-empty and strictly increasing.
    pub fn validate(&self) -> Result<()> {
        if self.inverted.len() != self.positional.len() {
            bail!(
                "inverted index has {} terms but positional index has {}",
                self.inverted.len(),
                self.positional.len()
            );
        }
        for ((term, docs), (pos_term, pos_docs)) in self.inverted.iter().zip(self.positional.iter()) {
            if term != pos_term {
                bail!("term sets differ at {term:?} / {pos_term:?}");
            }
            if docs.is_empty() {
                bail!("term {term:?} has no documents");
            }
            if !docs.iter().eq(pos_docs.keys()) {
                bail!("document sets differ for term {term:?}");
            }
            for (doc_id, positions) in pos_docs {
                if positions.is_empty() || positions.windows(2).any(|w| w[0] >= w[1]) {
                    bail!("positions for {term:?} in {doc_id} are empty or out of order");
                }
                if !self.docs.contains_key(doc_id) {
                    bail!("term {term:?} references unknown document {doc_id}");
                }
            }
        }
        Ok(())
    }
}

/// Single-writer accumulator for per-document term sequences.
pub struct IndexBuilder {
    normalizer: Normalizer,
    inverted: InvertedIndex,
    positional: PositionalIndex,
    docs: BTreeMap<DocId, DocMeta>,
}

impl IndexBuilder {
    pub fn new(normalizer: Normalizer) -> Self {
        Self {
            normalizer,
            inverted: InvertedIndex::new(),
            positional: PositionalIndex::new(),
            docs: BTreeMap::new(),
        }
    }

    /// Merge an already normalized term sequence. A repeated id is rejected and
    /// leaves the index untouched.
    pub fn add_terms(&mut self, doc_id: DocId, file_name: &str, terms: &[Term]) -> Result<(), BuildError> {
        if self.docs.contains_key(&doc_id) {
            return Err(BuildError::DuplicateDocument { path: PathBuf::from(file_name), doc_id });
        }
        let num_tokens = token_count(file_name, terms.len())?;
        for (pos, term) in (0..num_tokens).zip(terms) {
            self.inverted.insert(term, &doc_id);
            self.positional.push(term, &doc_id, pos);
        }
        self.docs.insert(doc_id, DocMeta { file_name: file_name.to_string(), num_tokens });
        Ok(())
    }

    pub fn finish(self) -> SearchIndex {
        SearchIndex {
            inverted: self.inverted,
            positional: self.positional,
            docs: self.docs,
            normalizer: self.normalizer,
        }
    }
}

/// Positions are `u32`, so a document longer than that cannot be indexed.
fn token_count(file_name: &str, len: usize) -> Result<Position, BuildError> {
    Position::try_from(len).map_err(|_| BuildError::DocumentTooLarge { path: PathBuf::from(file_name), num_tokens: len })
}

/// Build both indexes from in-memory documents. Normalization runs in
/// parallel; documents are merged in input order and a repeated id keeps the
/// first occurrence.
pub fn build<I, S>(documents: I, normalizer: &Normalizer) -> SearchIndex
where
    I: IntoIterator<Item = (DocId, S)>,
    S: AsRef<str> + Sync,
{
    let documents: Vec<(DocId, S)> = documents.into_iter().collect();
    let normalized: Vec<Vec<Term>> = documents
        .par_iter()
        .map(|(_, text)| normalizer.normalize(text.as_ref()))
        .collect();

    let mut builder = IndexBuilder::new(normalizer.clone());
    for ((doc_id, _), terms) in documents.into_iter().zip(normalized) {
        let file_name = doc_id.to_string();
        if let Err(e) = builder.add_terms(doc_id, &file_name, &terms) {
            tracing::warn!(error = %e, "skipping document");
        }
    }
    builder.finish()
}
