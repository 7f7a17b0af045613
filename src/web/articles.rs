use crate::domain::models::Article;
use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;
use crate::storage::{ArticlePatch, NewArticle};
use crate::web::{list_filters, parse_id, session::UserSession, ListQuery};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePayload {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub read_time: Option<i32>,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_articles).post(create_article))
        .route(
            "/:id",
            get(get_article).put(update_article).delete(delete_article),
        )
        .with_state(state)
}

fn validate_payload(payload: &ArticlePayload, require_all: bool) -> Vec<String> {
    let mut problems = Vec::new();
    match &payload.title {
        Some(title) if title.len() < 3 => problems.push("title must be at least 3 characters"),
        None if require_all => problems.push("title is required"),
        _ => {}
    }
    match &payload.excerpt {
        Some(excerpt) if excerpt.len() < 10 => {
            problems.push("excerpt must be at least 10 characters")
        }
        None if require_all => problems.push("excerpt is required"),
        _ => {}
    }
    match &payload.content {
        Some(content) if content.len() < 20 => {
            problems.push("content must be at least 20 characters")
        }
        None if require_all => problems.push("content is required"),
        _ => {}
    }
    problems.into_iter().map(String::from).collect()
}

async fn list_articles(
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Article>>> {
    let (search, category) = list_filters(&query, "All Categories");
    let articles = state
        .storage
        .list_articles(search.as_deref(), category.as_deref())
        .await?;
    Ok(Json(articles))
}

async fn get_article(
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<Article>> {
    let id = parse_id(&raw_id, "article")?;
    let article = state
        .storage
        .get_article(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Article not found"))?;
    Ok(Json(article))
}

async fn create_article(
    _session: UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<ArticlePayload>,
) -> ApiResult<impl IntoResponse> {
    let problems = validate_payload(&payload, true);
    if !problems.is_empty() {
        return Err(ApiError::validation_with(
            "Invalid article data",
            json!(problems),
        ));
    }

    let article = state
        .storage
        .create_article(NewArticle {
            title: payload.title.unwrap_or_default(),
            excerpt: payload.excerpt.unwrap_or_default(),
            content: payload.content.unwrap_or_default(),
            category: payload.category.unwrap_or_else(|| "General".to_string()),
            author: payload.author.unwrap_or_else(|| "Unknown".to_string()),
            published_at: payload.published_at.unwrap_or_else(Utc::now),
            read_time: payload.read_time.unwrap_or(1),
            image_url: payload.image_url,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(article)))
}

async fn update_article(
    _session: UserSession,
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
    Json(payload): Json<ArticlePayload>,
) -> ApiResult<Json<Article>> {
    let id = parse_id(&raw_id, "article")?;
    let problems = validate_payload(&payload, false);
    if !problems.is_empty() {
        return Err(ApiError::validation_with(
            "Invalid article data",
            json!(problems),
        ));
    }

    let article = state
        .storage
        .update_article(
            id,
            ArticlePatch {
                title: payload.title,
                excerpt: payload.excerpt,
                content: payload.content,
                category: payload.category,
                author: payload.author,
                published_at: payload.published_at,
                read_time: payload.read_time,
                image_url: payload.image_url,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found("Article not found"))?;

    Ok(Json(article))
}

async fn delete_article(
    _session: UserSession,
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&raw_id, "article")?;
    if !state.storage.delete_article(id).await? {
        return Err(ApiError::not_found("Article not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(search: Option<&str>, category: Option<&str>) -> ListQuery {
        ListQuery {
            search: search.map(String::from),
            category: category.map(String::from),
        }
    }

    #[test]
    fn sentinel_and_blank_filters_collapse_to_none() {
        let (search, category) = list_filters(&query(Some("  "), Some("All Categories")), "All Categories");
        assert_eq!(search, None);
        assert_eq!(category, None);

        let (search, category) = list_filters(&query(Some("listening"), Some("Nonverbal")), "All Categories");
        assert_eq!(search.as_deref(), Some("listening"));
        assert_eq!(category.as_deref(), Some("Nonverbal"));
    }

    #[test]
    fn create_requires_minimum_lengths() {
        let payload = ArticlePayload {
            title: Some("Hi".to_string()),
            excerpt: Some("too short".to_string()),
            content: None,
            category: None,
            author: None,
            read_time: None,
            image_url: None,
            published_at: None,
        };
        let problems = validate_payload(&payload, true);
        assert_eq!(problems.len(), 3);
    }

    #[test]
    fn partial_update_only_checks_provided_fields() {
        let payload = ArticlePayload {
            title: None,
            excerpt: None,
            content: Some("updated body text that is clearly long enough".to_string()),
            category: None,
            author: None,
            read_time: None,
            image_url: None,
            published_at: None,
        };
        assert!(validate_payload(&payload, false).is_empty());
    }
}
