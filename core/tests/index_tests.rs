use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use termdex_core::persist::{copy_texts, load_index, load_text, save_index, ArtifactFormat, IndexPaths};
use termdex_core::tokenizer::parse_stopwords;
use termdex_core::{build_from_dir, BuildError, CorpusOptions, DocId, Normalizer, QueryError, SearchIndex};

fn write_corpus(dir: &Path) {
    fs::write(dir.join("1.txt"), "Neural network model").unwrap();
    fs::write(dir.join("2.txt"), "Deep learning model").unwrap();
    fs::write(dir.join("3.txt"), "The network of the deep sea").unwrap();
    fs::write(dir.join("readme.txt"), "Model cards describe a model").unwrap();
}

fn normalizer() -> Normalizer {
    Normalizer::with_stopwords(parse_stopwords("the of a"), true)
}

fn built(dir: &Path) -> SearchIndex {
    let (index, report) = build_from_dir(dir, &CorpusOptions::default(), &normalizer()).unwrap();
    assert!(report.skipped.is_empty());
    index
}

#[test]
fn both_indexes_share_document_sets() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());
    let index = built(dir.path());

    index.validate().unwrap();
    for (term, docs) in index.inverted().iter() {
        let positional = index.positional().get(term).unwrap();
        let pos_docs: BTreeSet<&DocId> = positional.keys().collect();
        assert_eq!(docs.iter().collect::<BTreeSet<_>>(), pos_docs, "term {term}");
        assert!(positional.values().all(|p| !p.is_empty()));
    }
}

#[test]
fn document_ids_come_from_file_names() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());
    let index = built(dir.path());
    let ids: Vec<DocId> = index.docs().keys().cloned().collect();
    assert_eq!(
        ids,
        vec![DocId::Numeric(1), DocId::Numeric(2), DocId::Numeric(3), DocId::Named("readme.txt".into())]
    );
}

#[test]
fn building_twice_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());
    assert_eq!(built(dir.path()), built(dir.path()));
}

#[test]
fn stopwords_are_skipped_in_positions() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());
    let index = built(dir.path());
    // "The network of the deep sea" -> [network, deep, sea]
    assert_eq!(index.positional().positions("network", &DocId::Numeric(3)), Some(&[0][..]));
    assert_eq!(index.positional().positions("deep", &DocId::Numeric(3)), Some(&[1][..]));
    assert!(index.inverted().get("the").is_none());
}

#[test]
fn unreadable_document_is_skipped_without_losing_others() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());
    fs::write(dir.path().join("4.txt"), [0xff, 0xfe, 0x00, 0x9f]).unwrap();

    let (index, report) = build_from_dir(dir.path(), &CorpusOptions::default(), &normalizer()).unwrap();
    assert_eq!(report.indexed, 4);
    assert!(matches!(report.skipped.as_slice(), [BuildError::UnreadableDocument { .. }]));
    assert!(index.doc(&DocId::Numeric(4)).is_none());

    let clean_dir = tempfile::tempdir().unwrap();
    write_corpus(clean_dir.path());
    let clean = built(clean_dir.path());
    assert_eq!(clean.inverted(), index.inverted());
    assert_eq!(clean.positional(), index.positional());
}

#[test]
fn json_round_trip() {
    let corpus = tempfile::tempdir().unwrap();
    write_corpus(corpus.path());
    let index = built(corpus.path());

    let out = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(out.path());
    let meta = save_index(&paths, &index, ArtifactFormat::Json, "2024-01-01T00:00:00Z").unwrap();
    assert_eq!(meta.num_docs, 4);
    assert_eq!(load_index(&paths).unwrap(), index);

    let inverted: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.path().join("inverted_index.json")).unwrap()).unwrap();
    assert_eq!(inverted["model"], serde_json::json!([1, 2, "readme.txt"]));
    let positional: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.path().join("positional_index.json")).unwrap()).unwrap();
    assert_eq!(positional["model"]["1"], serde_json::json!([2]));
    assert_eq!(positional["model"]["readme.txt"], serde_json::json!([0, 3]));
}

#[test]
fn bincode_round_trip() {
    let corpus = tempfile::tempdir().unwrap();
    write_corpus(corpus.path());
    let index = built(corpus.path());

    let out = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(out.path());
    save_index(&paths, &index, ArtifactFormat::Bincode, "2024-01-01T00:00:00Z").unwrap();
    assert!(out.path().join("positional_index.bin").exists());
    let loaded = load_index(&paths).unwrap();
    assert_eq!(loaded, index);
    assert_eq!(loaded.normalizer(), index.normalizer());
}

#[test]
fn saved_artifacts_are_deterministic() {
    let corpus = tempfile::tempdir().unwrap();
    write_corpus(corpus.path());
    let (a, b) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
    save_index(&IndexPaths::new(a.path()), &built(corpus.path()), ArtifactFormat::Json, "t").unwrap();
    save_index(&IndexPaths::new(b.path()), &built(corpus.path()), ArtifactFormat::Json, "t").unwrap();
    for name in ["inverted_index.json", "positional_index.json", "documents.json", "meta.json"] {
        assert_eq!(fs::read(a.path().join(name)).unwrap(), fs::read(b.path().join(name)).unwrap(), "{name}");
    }
}

#[test]
fn loaded_index_queries_with_its_own_normalizer() {
    let corpus = tempfile::tempdir().unwrap();
    write_corpus(corpus.path());
    let out = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(out.path());
    save_index(&paths, &built(corpus.path()), ArtifactFormat::Json, "t").unwrap();
    let index = load_index(&paths).unwrap();

    assert_eq!(index.search("models AND networks").unwrap().doc_ids, vec![DocId::Numeric(1)]);
    assert_eq!(
        index.search("deep OR neural NOT learning").unwrap().doc_ids,
        vec![DocId::Numeric(1), DocId::Numeric(3)]
    );
    assert_eq!(index.search("network deep / 1").unwrap().doc_ids, vec![DocId::Numeric(3)]);
    assert!(index.search("zzz").unwrap().doc_ids.is_empty());
    assert!(matches!(index.search(""), Err(QueryError::MalformedQuery(_))));
    assert!(matches!(index.search("network / 1"), Err(QueryError::InvalidProximityFormat(_))));
}

#[test]
fn texts_are_copied_for_snippets() {
    let corpus = tempfile::tempdir().unwrap();
    write_corpus(corpus.path());
    let index = built(corpus.path());
    let out = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(out.path());
    assert_eq!(copy_texts(&paths, corpus.path(), &index).unwrap(), 4);
    let meta = index.doc(&DocId::Numeric(2)).unwrap();
    assert_eq!(load_text(&paths, meta).unwrap(), "Deep learning model");
}
