use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

use crate::Term;

lazy_static! {
    static ref WORD_RE: Regex = Regex::new(r"\w+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// Normalization policy shared by index construction and query parsing.
/// Persisted alongside the index so a loaded index is queried with the
/// policy it was built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizerSettings {
    pub stemming: bool,
    #[serde(default)]
    pub stopwords: BTreeSet<String>,
}

impl Default for NormalizerSettings {
    fn default() -> Self {
        Self { stemming: true, stopwords: BTreeSet::new() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalizer {
    settings: NormalizerSettings,
}

impl Normalizer {
    pub fn new(settings: NormalizerSettings) -> Self {
        Self { settings }
    }

    pub fn with_stopwords(stopwords: BTreeSet<String>, stemming: bool) -> Self {
        Self::new(NormalizerSettings { stemming, stopwords })
    }

    pub fn settings(&self) -> &NormalizerSettings {
        &self.settings
    }

    /// Normalize a whole text into its ordered term sequence.
    pub fn normalize(&self, text: &str) -> Vec<Term> {
        normalize(text, &self.settings.stopwords, self.settings.stemming)
    }

    /// Normalize a single word. Returns `None` when the word is a stopword.
    pub fn normalize_term(&self, word: &str) -> Option<Term> {
        let lowered = word.nfkc().collect::<String>().to_lowercase();
        normalize_word(&lowered, &self.settings.stopwords, self.settings.stemming)
    }
}

/// Apply NFKC, lowercase, and split on the word-boundary rule (runs of `\w`).
pub fn split_words(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    WORD_RE.find_iter(&normalized).map(|m| m.as_str().to_string()).collect()
}

/// Lowercase, split, drop stopwords, then stem. Positions in the output are
/// the token offsets recorded by the positional index.
pub fn normalize(text: &str, stopwords: &BTreeSet<String>, stemming: bool) -> Vec<Term> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    WORD_RE
        .find_iter(&normalized)
        .filter_map(|m| normalize_word(m.as_str(), stopwords, stemming))
        .collect()
}

// Stopwords are matched on the pre-stem form.
fn normalize_word(word: &str, stopwords: &BTreeSet<String>, stemming: bool) -> Option<Term> {
    if stopwords.contains(word) {
        return None;
    }
    let term = if stemming { STEMMER.stem(word) } else { Cow::Borrowed(word) };
    Some(term.into_owned())
}

pub fn parse_stopwords(text: &str) -> BTreeSet<String> {
    text.split_whitespace().map(|w| w.to_lowercase()).collect()
}

/// Load a whitespace separated stopword list.
pub fn load_stopwords<P: AsRef<Path>>(path: P) -> Result<BTreeSet<String>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading stopwords from {}", path.display()))?;
    Ok(parse_stopwords(&text))
}
