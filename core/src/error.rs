use std::path::PathBuf;

use crate::DocId;

/// Conditions reported to the caller instead of a result set.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Boolean query is empty or does not alternate term/operator/term.
    #[error("malformed query: {0}")]
    MalformedQuery(String),
    /// Proximity query lacks exactly two terms or a non-negative integer window.
    #[error("invalid proximity format: {0}")]
    InvalidProximityFormat(String),
}

impl QueryError {
    /// Stable name of the condition, as reported at the HTTP boundary.
    pub fn condition(&self) -> &'static str {
        match self {
            QueryError::MalformedQuery(_) => "MalformedQuery",
            QueryError::InvalidProximityFormat(_) => "InvalidProximityFormat",
        }
    }
}

/// Per-document failures during a build. These are recorded and skipped,
/// never propagated out of the batch.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("unreadable document {}: {reason}", path.display())]
    UnreadableDocument { path: PathBuf, reason: String },
    #[error("duplicate document id {doc_id} from {}", path.display())]
    DuplicateDocument { path: PathBuf, doc_id: DocId },
    #[error("document {} has {num_tokens} tokens, more than a position can address", path.display())]
    DocumentTooLarge { path: PathBuf, num_tokens: usize },
}
