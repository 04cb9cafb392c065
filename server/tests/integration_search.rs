use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use server::{build_app, ServerConfig};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use termdex_core::persist::{copy_texts, save_index, ArtifactFormat, IndexPaths};
use termdex_core::{build_from_dir, CorpusOptions, Normalizer};
use tower::ServiceExt;

fn build_tiny_index(corpus: &Path, out: &Path, texts: &[(&str, &str)]) {
    for (name, text) in texts {
        fs::write(corpus.join(name), text).unwrap();
    }
    let normalizer = Normalizer::with_stopwords(BTreeSet::from(["the".to_string()]), true);
    let (index, _) = build_from_dir(corpus, &CorpusOptions::default(), &normalizer).unwrap();
    let paths = IndexPaths::new(out);
    save_index(&paths, &index, ArtifactFormat::Json, "2024-01-01T00:00:00Z").unwrap();
    copy_texts(&paths, corpus, &index).unwrap();
}

fn app(out: &Path, admin_token: Option<&str>) -> Router {
    build_app(ServerConfig {
        index_dir: out.to_path_buf(),
        admin_token: admin_token.map(str::to_string),
        cors_allow_origin: None,
    })
    .unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

const CORPUS: &[(&str, &str)] = &[
    ("1.txt", "Neural network model"),
    ("2.txt", "Deep learning model"),
    ("notes.txt", "The model notes"),
];

#[tokio::test]
async fn boolean_search_returns_sorted_ids_with_snippets() {
    let (corpus, out) = (tempdir().unwrap(), tempdir().unwrap());
    build_tiny_index(corpus.path(), out.path(), CORPUS);

    let (status, json) = get(app(out.path(), None), "/search?query=model%20NOT%20deep").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["kind"], "boolean");
    assert_eq!(json["total_hits"], 2);
    let ids: Vec<Value> = json["results"].as_array().unwrap().iter().map(|h| h["doc_id"].clone()).collect();
    assert_eq!(ids, vec![Value::from(1), Value::from("notes.txt")]);
    assert_eq!(json["results"][0]["snippet"], "Neural network <mark>model</mark>");
}

#[tokio::test]
async fn proximity_search() {
    let (corpus, out) = (tempdir().unwrap(), tempdir().unwrap());
    build_tiny_index(corpus.path(), out.path(), CORPUS);

    let (status, json) = get(app(out.path(), None), "/search?query=model%20network%20%2F%202").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["kind"], "proximity");
    assert_eq!(json["results"][0]["doc_id"], 1);
    assert_eq!(json["total_hits"], 1);

    let (status, json) = get(app(out.path(), None), "/search?query=state-of-the-art%20model%20%2F%203").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 0);
}

#[tokio::test]
async fn query_conditions_map_to_bad_request() {
    let (corpus, out) = (tempdir().unwrap(), tempdir().unwrap());
    build_tiny_index(corpus.path(), out.path(), CORPUS);

    let (status, json) = get(app(out.path(), None), "/search?query=model%20AND").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["condition"], "MalformedQuery");

    let (status, json) = get(app(out.path(), None), "/search?query=model%20%2F%20x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["condition"], "InvalidProximityFormat");

    let (status, _) = get(app(out.path(), None), "/search").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_term_is_empty_not_an_error() {
    let (corpus, out) = (tempdir().unwrap(), tempdir().unwrap());
    build_tiny_index(corpus.path(), out.path(), CORPUS);

    let (status, json) = get(app(out.path(), None), "/search?query=zzz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 0);
}

#[tokio::test]
async fn document_and_suggest_endpoints() {
    let (corpus, out) = (tempdir().unwrap(), tempdir().unwrap());
    build_tiny_index(corpus.path(), out.path(), CORPUS);

    let (status, json) = get(app(out.path(), None), "/document?doc_id=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["content"], "Deep learning model");

    let (status, _) = get(app(out.path(), None), "/document?doc_id=99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = get(app(out.path(), None), "/suggest?query=ne").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["suggestions"], serde_json::json!(["network", "neural"]));
}

#[tokio::test]
async fn reload_swaps_in_rebuilt_index() {
    let (corpus, out) = (tempdir().unwrap(), tempdir().unwrap());
    build_tiny_index(corpus.path(), out.path(), CORPUS);
    let app = app(out.path(), Some("secret"));

    let (_, json) = get(app.clone(), "/search?query=transformer").await;
    assert_eq!(json["total_hits"], 0);

    build_tiny_index(corpus.path(), out.path(), &[("3.txt", "Transformer model")]);

    let unauthorized = Request::post("/admin/reload").body(Body::empty()).unwrap();
    let (status, _) = send(app.clone(), unauthorized).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let reload = Request::post("/admin/reload").header("X-ADMIN-TOKEN", "secret").body(Body::empty()).unwrap();
    let (status, json) = send(app.clone(), reload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["num_docs"], 4);

    let (_, json) = get(app, "/search?query=transformer").await;
    assert_eq!(json["results"][0]["doc_id"], 3);
}
