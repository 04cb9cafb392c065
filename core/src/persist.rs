use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::index::{DocId, DocMeta, InvertedIndex, PositionalIndex, SearchIndex};
use crate::tokenizer::{Normalizer, NormalizerSettings};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    #[default]
    Json,
    Bincode,
}

impl ArtifactFormat {
    fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Json => "json",
            ArtifactFormat::Bincode => "bin",
        }
    }
}

impl FromStr for ArtifactFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ArtifactFormat::Json),
            "bincode" | "bin" => Ok(ArtifactFormat::Bincode),
            other => Err(format!("unknown artifact format {other:?} (expected json or bincode)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub format: ArtifactFormat,
    pub num_docs: u32,
    pub num_terms: u32,
    pub created_at: String,
    pub normalizer: NormalizerSettings,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn inverted(&self, format: ArtifactFormat) -> PathBuf { self.root.join(format!("inverted_index.{}", format.extension())) }
    fn positional(&self, format: ArtifactFormat) -> PathBuf { self.root.join(format!("positional_index.{}", format.extension())) }
    fn documents(&self, format: ArtifactFormat) -> PathBuf { self.root.join(format!("documents.{}", format.extension())) }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn texts_dir(&self) -> PathBuf { self.root.join("texts") }
}

fn write_artifact<T: Serialize>(path: &Path, value: &T, format: ArtifactFormat) -> Result<()> {
    let bytes = match format {
        ArtifactFormat::Json => serde_json::to_vec_pretty(value)?,
        ArtifactFormat::Bincode => bincode::serialize(value)?,
    };
    let mut f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    f.write_all(&bytes)?;
    Ok(())
}

fn read_artifact<T: DeserializeOwned>(path: &Path, format: ArtifactFormat) -> Result<T> {
    let mut f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let value: T = match format {
        ArtifactFormat::Json => serde_json::from_slice(&buf).with_context(|| format!("decoding {}", path.display()))?,
        ArtifactFormat::Bincode => bincode::deserialize(&buf).with_context(|| format!("decoding {}", path.display()))?,
    };
    Ok(value)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta()).with_context(|| format!("opening {}", paths.meta().display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Write the inverted index, positional index, document table and
/// `meta.json`. Every map is ordered, so the same index always produces the
/// same artifact bytes.
pub fn save_index(paths: &IndexPaths, index: &SearchIndex, format: ArtifactFormat, created_at: &str) -> Result<MetaFile> {
    create_dir_all(&paths.root)?;
    write_artifact(&paths.inverted(format), index.inverted(), format)?;
    write_artifact(&paths.positional(format), index.positional(), format)?;
    write_artifact(&paths.documents(format), index.docs(), format)?;
    let meta = MetaFile {
        version: FORMAT_VERSION,
        format,
        num_docs: meta_count("documents", index.num_docs())?,
        num_terms: meta_count("terms", index.num_terms())?,
        created_at: created_at.to_string(),
        normalizer: index.normalizer().settings().clone(),
    };
    save_meta(paths, &meta)?;
    tracing::info!(root = %paths.root.display(), ?format, num_docs = meta.num_docs, num_terms = meta.num_terms, "saved index");
    Ok(meta)
}

fn meta_count(what: &str, n: usize) -> Result<u32> {
    u32::try_from(n).with_context(|| format!("{n} {what} do not fit in meta.json"))
}

/// Load an index written by [`save_index`], in whatever format `meta.json`
/// records, and check that the two indexes agree.
pub fn load_index(paths: &IndexPaths) -> Result<SearchIndex> {
    let meta = load_meta(paths)?;
    if meta.version != FORMAT_VERSION {
        bail!("unsupported index version {} (expected {FORMAT_VERSION})", meta.version);
    }
    let inverted: InvertedIndex = read_artifact(&paths.inverted(meta.format), meta.format)?;
    let positional: PositionalIndex = read_artifact(&paths.positional(meta.format), meta.format)?;
    let docs: BTreeMap<DocId, DocMeta> = read_artifact(&paths.documents(meta.format), meta.format)?;
    let index = SearchIndex::from_parts(inverted, positional, docs, Normalizer::new(meta.normalizer))
        .with_context(|| format!("index at {} is inconsistent", paths.root.display()))?;
    tracing::info!(root = %paths.root.display(), num_docs = index.num_docs(), num_terms = index.num_terms(), "loaded index");
    Ok(index)
}

/// Copy each indexed document's text from the corpus into `texts/` so the
/// index directory can serve snippets on its own.
pub fn copy_texts(paths: &IndexPaths, corpus_dir: &Path, index: &SearchIndex) -> Result<usize> {
    let dir = paths.texts_dir();
    create_dir_all(&dir)?;
    let mut copied = 0;
    for meta in index.docs().values() {
        let src = corpus_dir.join(&meta.file_name);
        match std::fs::copy(&src, dir.join(&meta.file_name)) {
            Ok(_) => copied += 1,
            Err(e) => tracing::warn!(path = %src.display(), error = %e, "could not copy document text"),
        }
    }
    Ok(copied)
}

pub fn load_text(paths: &IndexPaths, meta: &DocMeta) -> Result<String> {
    let path = paths.texts_dir().join(&meta.file_name);
    std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
}
