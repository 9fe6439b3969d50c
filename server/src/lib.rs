use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use newsdex::corpus::{load_news_items, read_news_item, snippet};
use newsdex::persist::{load_all, IndexPaths};
use newsdex::query::parse;
use newsdex::{IndexStats, NewsId, NewsItem, QueryError, QueryOptions, SearchIndex};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Results returned per query unless `all=true`.
pub const SHOW_MAX: usize = 10;
const SNIPPET_WIDTH: usize = 200;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default)]
    pub stem: bool,
    #[serde(default)]
    pub rank: bool,
    #[serde(default)]
    pub all: bool,
    #[serde(default)]
    pub snippet: bool,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub news_id: NewsId,
    pub doc_id: u32,
    pub ordinal: u32,
    pub score: Option<f32>,
    pub title: Option<String>,
    pub snippet: Option<String>,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub query: String,
    pub count: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<SearchIndex>,
}

type ApiError = (StatusCode, Json<Value>);

fn query_error(e: QueryError) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))
}

pub fn build_app(index_dir: String) -> Result<Router> {
    // Load the whole index at startup; handlers only read it
    let (index, meta) = load_all(&IndexPaths::new(&index_dir))?;
    tracing::info!(index_dir, num_news = meta.num_news, created_at = %meta.created_at, "index loaded");
    Ok(router(index))
}

pub fn router(index: SearchIndex) -> Router {
    let app_state = AppState { index: Arc::new(index) };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
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
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/count", get(count_handler))
        .route("/news/:news_id", get(news_handler))
        .route("/stats", get(stats_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let options = QueryOptions { stemming: params.stem, ranking: params.rank };
    let hits = state.index.search(&params.q, &options).map_err(query_error)?;
    let total_hits = hits.len();

    let node = parse(&params.q).map_err(query_error)?;
    let terms: Vec<&str> = node.positive_terms().into_iter().map(|(_, t)| t).collect();
    let take = if params.all { total_hits } else { SHOW_MAX };

    let shown: Vec<_> = hits.into_iter().take(take).collect();
    let ids: Vec<NewsId> = shown.iter().map(|h| h.news_id).collect();
    let mut items = load_news_items(&state.index, &ids);

    let mut results = Vec::with_capacity(shown.len());
    for hit in shown {
        let Some(at) = state.index.lookup(hit.news_id) else { continue };
        let item = items.remove(&hit.news_id);
        let snippet = match (&item, params.snippet) {
            (Some(item), true) => Some(highlight_terms(&snippet(&item.article, &terms, SNIPPET_WIDTH), &terms)),
            _ => None,
        };
        results.push(SearchHit {
            news_id: hit.news_id,
            doc_id: at.doc_id,
            ordinal: at.ordinal,
            score: hit.score,
            title: item.map(|i| i.title),
            snippet,
        });
    }

    let elapsed = start.elapsed();
    Ok(Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), total_hits, results }))
}

pub async fn count_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<CountResponse>, ApiError> {
    let options = QueryOptions { stemming: params.stem, ranking: false };
    let (_, count) = state.index.count_only(&params.q, &options).map_err(query_error)?;
    Ok(Json(CountResponse { query: params.q, count }))
}

pub async fn news_handler(State(state): State<AppState>, Path(news_id): Path<NewsId>) -> Result<Json<Value>, ApiError> {
    let Some(at) = state.index.lookup(news_id) else {
        return Err((StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))));
    };
    let origin = state.index.doc(at.doc_id).map(|d| d.origin.clone());
    let mut obj = json!({
        "news_id": news_id,
        "doc_id": at.doc_id,
        "ordinal": at.ordinal,
        "origin": origin,
    });
    if let Some(item) = load_item(&state.index, news_id) {
        obj["item"] = serde_json::to_value(item).unwrap_or(Value::Null);
    }
    Ok(Json(obj))
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<IndexStats> {
    Json(state.index.stats())
}

fn load_item(index: &SearchIndex, news_id: NewsId) -> Option<NewsItem> {
    let at = index.lookup(news_id)?;
    let origin = &index.doc(at.doc_id)?.origin;
    match read_news_item(std::path::Path::new(origin), at.ordinal) {
        Ok(item) => Some(item),
        Err(e) => {
            tracing::warn!(news_id, error = %e, "news item unavailable for display");
            None
        }
    }
}

fn highlight_terms(snippet: &str, terms: &[&str]) -> String {
    // one pass over every term, so inserted tags are never matched again
    let mut alternatives: Vec<String> = terms.iter().filter(|t| !t.trim().is_empty()).map(|t| regex::escape(t)).collect();
    if alternatives.is_empty() {
        return snippet.to_string();
    }
    alternatives.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    alternatives.dedup();
    let Ok(pat) = regex::RegexBuilder::new(&format!(r"\b(?:{})\b", alternatives.join("|")))
        .case_insensitive(true)
        .build()
    else {
        return snippet.to_string();
    };
    pat.replace_all(snippet, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).into_owned()
}
