use anyhow::{bail, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::BuildError;
use crate::index::{DocId, IndexBuilder, SearchIndex, Term};
use crate::tokenizer::Normalizer;

#[derive(Debug, Clone, Default)]
pub struct CorpusOptions {
    /// Only index files with this extension (without the dot).
    pub extension: Option<String>,
}

/// Outcome of a directory build. Skipped documents never abort the batch.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub indexed: usize,
    pub skipped: Vec<BuildError>,
}

/// Regular files directly inside `dir`, sorted by file name.
pub fn list_documents(dir: &Path, options: &CorpusOptions) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("corpus directory {} does not exist", dir.display());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "cannot list corpus entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if let Some(want) = &options.extension {
            if path.extension().and_then(|s| s.to_str()) != Some(want.as_str()) {
                continue;
            }
        }
        files.push(path.to_path_buf());
    }
    Ok(files)
}

fn unreadable(path: &Path, reason: impl ToString) -> BuildError {
    BuildError::UnreadableDocument { path: path.to_path_buf(), reason: reason.to_string() }
}

fn load_document(path: &Path, normalizer: &Normalizer) -> Result<(DocId, String, Vec<Term>), BuildError> {
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| unreadable(path, "file name is not valid UTF-8"))?
        .to_string();
    let bytes = std::fs::read(path).map_err(|e| unreadable(path, e))?;
    let text = String::from_utf8(bytes).map_err(|e| unreadable(path, e))?;
    Ok((DocId::from_file_name(&file_name), file_name, normalizer.normalize(&text)))
}

/// Read and normalize every document under `dir` in parallel, then merge them
/// into a fresh index in file-name order.
pub fn build_from_dir(dir: &Path, options: &CorpusOptions, normalizer: &Normalizer) -> Result<(SearchIndex, BuildReport)> {
    let files = list_documents(dir, options)?;
    let loaded: Vec<Result<(DocId, String, Vec<Term>), BuildError>> =
        files.par_iter().map(|path| load_document(path, normalizer)).collect();

    let mut builder = IndexBuilder::new(normalizer.clone());
    let mut report = BuildReport::default();
    for result in loaded {
        let merged = result.and_then(|(doc_id, file_name, terms)| builder.add_terms(doc_id, &file_name, &terms));
        match merged {
            Ok(()) => report.indexed += 1,
            Err(e) => {
                tracing::warn!(error = %e, "skipping document");
                report.skipped.push(e);
            }
        }
    }
    let index = builder.finish();
    tracing::info!(
        indexed = report.indexed,
        skipped = report.skipped.len(),
        num_terms = index.num_terms(),
        "built index from directory"
    );
    Ok((index, report))
}
