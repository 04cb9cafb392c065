pub mod corpus;
pub mod error;
pub mod handle;
pub mod index;
pub mod persist;
pub mod query;
pub mod suggest;
pub mod tokenizer;

pub use corpus::{build_from_dir, list_documents, BuildReport, CorpusOptions};
pub use error::{BuildError, QueryError};
pub use handle::IndexHandle;
pub use index::{build, DocId, DocMeta, IndexBuilder, InvertedIndex, PositionalIndex, SearchIndex, Term};
pub use query::{Query, QueryKind, SearchOutcome};
pub use tokenizer::{Normalizer, NormalizerSettings};
