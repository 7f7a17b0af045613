use crate::domain::models::Faq;
use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;
use crate::storage::{FaqPatch, NewFaq};
use crate::web::{list_filters, parse_id, session::UserSession, ListQuery};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct FaqPayload {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub category: Option<String>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_faqs).post(create_faq))
        .route("/:id", get(get_faq).put(update_faq).delete(delete_faq))
        .with_state(state)
}

async fn list_faqs(
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Faq>>> {
    let (search, category) = list_filters(&query, "All Topics");
    let faqs = state
        .storage
        .list_faqs(search.as_deref(), category.as_deref())
        .await?;
    Ok(Json(faqs))
}

async fn get_faq(
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<Faq>> {
    let id = parse_id(&raw_id, "FAQ")?;
    let faq = state
        .storage
        .get_faq(id)
        .await?
        .ok_or_else(|| ApiError::not_found("FAQ not found"))?;
    Ok(Json(faq))
}

async fn create_faq(
    _session: UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<FaqPayload>,
) -> ApiResult<impl IntoResponse> {
    let question = payload.question.as_deref().map(str::trim).unwrap_or("");
    let answer = payload.answer.as_deref().map(str::trim).unwrap_or("");
    if question.is_empty() || answer.is_empty() {
        return Err(ApiError::validation("Question and answer are required"));
    }

    let faq = state
        .storage
        .create_faq(NewFaq {
            question: question.to_string(),
            answer: answer.to_string(),
            category: payload.category.unwrap_or_else(|| "General".to_string()),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(faq)))
}

async fn update_faq(
    _session: UserSession,
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
    Json(payload): Json<FaqPayload>,
) -> ApiResult<Json<Faq>> {
    let id = parse_id(&raw_id, "FAQ")?;

    // A provided-but-blank field is a mistake, not a merge request.
    if payload.question.as_deref().is_some_and(|q| q.trim().is_empty())
        || payload.answer.as_deref().is_some_and(|a| a.trim().is_empty())
    {
        return Err(ApiError::validation("Question and answer are required"));
    }

    let faq = state
        .storage
        .update_faq(
            id,
            FaqPatch {
                question: payload.question,
                answer: payload.answer,
                category: payload.category,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found("FAQ not found"))?;

    Ok(Json(faq))
}

async fn delete_faq(
    _session: UserSession,
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&raw_id, "FAQ")?;
    if !state.storage.delete_faq(id).await? {
        return Err(ApiError::not_found("FAQ not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
