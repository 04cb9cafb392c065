use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use termdex_core::persist::{load_index, load_text, IndexPaths};
use termdex_core::query::QueryKind;
use termdex_core::suggest::DEFAULT_MAX_SUGGESTIONS;
use termdex_core::{DocId, IndexHandle, QueryError};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Characters kept on each side of the first highlighted match.
const SNIPPET_CONTEXT: usize = 50;
/// Length of the fallback snippet when no query word appears verbatim.
const SNIPPET_FALLBACK_CHARS: usize = 250;

pub struct ServerConfig {
    pub index_dir: PathBuf,
    pub admin_token: Option<String>,
    /// Comma separated origins; `None` allows any origin.
    pub cors_allow_origin: Option<String>,
}

impl ServerConfig {
    /// Reads `ADMIN_TOKEN` and `CORS_ALLOW_ORIGIN` from the environment.
    pub fn from_env(index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: index_dir.into(),
            admin_token: std::env::var("ADMIN_TOKEN").ok(),
            cors_allow_origin: std::env::var("CORS_ALLOW_ORIGIN").ok(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub index_paths_root: PathBuf,
    pub index: IndexHandle,
    pub admin_token: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

#[derive(Deserialize)]
pub struct SuggestParams {
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_max")]
    pub max: usize,
}
fn default_max() -> usize { DEFAULT_MAX_SUGGESTIONS }

#[derive(Deserialize)]
pub struct DocumentParams {
    pub doc_id: Option<String>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub kind: QueryKind,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub snippet: Option<String>,
}

/// Errors returned to HTTP clients as `{"error": ...}` with a matching status.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or blank request parameter (400).
    BadRequest(String),
    /// Query text rejected by the parser (400, with the condition name).
    Query(QueryError),
    /// Unknown document (404).
    NotFound(String),
    /// Missing or wrong admin token (401).
    Unauthorized(String),
    /// Unexpected failure (500).
    Internal(String),
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        ApiError::Query(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Query(e) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": e.to_string(), "condition": e.condition() }),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg })),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg })),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, serde_json::json!({ "error": msg })),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, serde_json::json!({ "error": msg })),
        };
        (status, Json(body)).into_response()
    }
}

pub fn build_app(config: ServerConfig) -> Result<Router> {
    // Load the index once at startup; /admin/reload swaps in a fresh copy.
    let index_paths = IndexPaths::new(&config.index_dir);
    let index = load_index(&index_paths)?;
    let app_state = AppState {
        index_paths_root: config.index_dir.clone(),
        index: IndexHandle::new(index),
        admin_token: config.admin_token,
    };

    let cors = match config.cors_allow_origin {
        Some(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        None => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/suggest", get(suggest_handler))
        .route("/document", get(document_handler))
        .route("/admin/reload", post(reload_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let query = match params.query {
        Some(q) if !q.trim().is_empty() => q,
        _ => return Err(ApiError::BadRequest("Query parameter is required".into())),
    };
    let index = state.index.current();
    let outcome = index.search(&query)?;

    let paths = IndexPaths::new(&state.index_paths_root);
    let highlighter = highlight_regex(&outcome.highlight_terms);
    let results: Vec<SearchHit> = outcome
        .doc_ids
        .into_iter()
        .map(|doc_id| {
            let snippet = index
                .doc(&doc_id)
                .and_then(|meta| load_text(&paths, meta).ok())
                .map(|text| make_snippet(&text, highlighter.as_ref()));
            SearchHit { doc_id, snippet }
        })
        .collect();

    let elapsed = start.elapsed();
    tracing::debug!(query = %query, hits = results.len(), took_s = elapsed.as_secs_f64(), "search");
    Ok(Json(SearchResponse { query, kind: outcome.kind, took_s: elapsed.as_secs_f64(), total_hits: results.len(), results }))
}

pub async fn suggest_handler(State(state): State<AppState>, Query(params): Query<SuggestParams>) -> Json<serde_json::Value> {
    let suggestions = state.index.current().suggest(&params.query, params.max);
    Json(serde_json::json!({ "suggestions": suggestions }))
}

pub async fn document_handler(State(state): State<AppState>, Query(params): Query<DocumentParams>) -> Result<Json<serde_json::Value>, ApiError> {
    let key = match params.doc_id {
        Some(k) if !k.trim().is_empty() => k,
        _ => return Err(ApiError::BadRequest("Document ID is required".into())),
    };
    let doc_id = DocId::from_key(key.trim());
    let index = state.index.current();
    let meta = index.doc(&doc_id).ok_or_else(|| ApiError::NotFound("Document not found".into()))?;
    let content = load_text(&IndexPaths::new(&state.index_paths_root), meta)
        .map_err(|e| ApiError::Internal(format!("Error reading document: {e}")))?;
    Ok(Json(serde_json::json!({ "doc_id": doc_id, "content": content })))
}

async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let root = state.index_paths_root.clone();
    let loaded = tokio::task::spawn_blocking(move || load_index(&IndexPaths::new(root)))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(format!("{e:#}")))?;
    let (num_docs, num_terms) = (loaded.num_docs(), loaded.num_terms());
    state.index.replace(loaded);
    tracing::info!(num_docs, num_terms, "reloaded index");
    Ok(Json(serde_json::json!({ "num_docs": num_docs, "num_terms": num_terms })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(ApiError::Unauthorized("ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("invalid admin token".into()))
    }
}

/// Case-insensitive whole-word matcher for any of the query words.
fn highlight_regex(terms: &[String]) -> Option<Regex> {
    let alternatives: Vec<String> = terms.iter().filter(|t| !t.trim().is_empty()).map(|t| regex::escape(t)).collect();
    if alternatives.is_empty() {
        return None;
    }
    RegexBuilder::new(&format!(r"\b(?:{})\b", alternatives.join("|")))
        .case_insensitive(true)
        .build()
        .ok()
}

fn make_snippet(text: &str, highlighter: Option<&Regex>) -> String {
    let first = highlighter.and_then(|re| re.find(text).map(|m| (re, m.start(), m.end())));
    match first {
        Some((re, match_start, match_end)) => {
            let start = text[..match_start]
                .char_indices()
                .rev()
                .nth(SNIPPET_CONTEXT - 1)
                .map_or(0, |(i, _)| i);
            let end = text[match_end..]
                .char_indices()
                .nth(SNIPPET_CONTEXT)
                .map_or(text.len(), |(i, _)| match_end + i);
            let marked = re.replace_all(&text[start..end], "<mark>$0</mark>");
            let lead = if start > 0 { "..." } else { "" };
            let tail = if end < text.len() { "..." } else { "" };
            format!("{lead}{marked}{tail}")
        }
        None => {
            let head: String = text.chars().take(SNIPPET_FALLBACK_CHARS).collect();
            if head.len() < text.len() { format!("{head}...") } else { head }
        }
    }
}
