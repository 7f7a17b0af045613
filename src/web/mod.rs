pub mod articles;
pub mod auth;
pub mod categories;
pub mod faqs;
pub mod oauth;
pub mod questions;
pub mod results;
pub mod session;
pub mod videos;

use crate::error::ApiError;
use crate::state::SharedState;
use axum::{routing::get, Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub category: Option<String>,
}

/// Empty search terms and the client's "show everything" category sentinel
/// both mean "no filter".
pub(crate) fn list_filters(
    query: &ListQuery,
    category_sentinel: &str,
) -> (Option<String>, Option<String>) {
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_string);
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|cat| !cat.is_empty() && *cat != category_sentinel)
        .map(str::to_string);
    (search, category)
}

pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::validation(format!("Invalid {what} ID")))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "message": "Server is running" }))
}

pub fn routes(state: SharedState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .merge(auth::router(state.clone()))
        .nest("/auth", oauth::router(state.clone()))
        .nest("/articles", articles::router(state.clone()))
        .nest("/faqs", faqs::router(state.clone()))
        .nest("/test-categories", categories::router(state.clone()))
        .nest("/test-questions", questions::router(state.clone()))
        .nest("/test-results", results::router(state.clone()))
        .nest("/video-analyses", videos::router(state));

    Router::new().nest("/api", api)
}
