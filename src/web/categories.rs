use crate::domain::models::TestCategory;
use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;
use crate::storage::NewTestCategory;
use crate::web::{parse_id, session::UserSession};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub duration: Option<i32>,
    pub question_count: Option<i32>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/:id",
            get(get_category).put(update_category).delete(delete_category),
        )
        .with_state(state)
}

fn required_fields(payload: CategoryPayload) -> Result<NewTestCategory, ApiError> {
    let missing = || {
        ApiError::validation(
            "All fields are required: name, description, duration, questionCount, color, icon",
        )
    };

    let name = payload.name.filter(|v| !v.trim().is_empty()).ok_or_else(missing)?;
    let description = payload
        .description
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(missing)?;
    let duration = payload.duration.filter(|v| *v > 0).ok_or_else(missing)?;
    let question_count = payload
        .question_count
        .filter(|v| *v > 0)
        .ok_or_else(missing)?;
    let color = payload.color.filter(|v| !v.trim().is_empty()).ok_or_else(missing)?;
    let icon = payload.icon.filter(|v| !v.trim().is_empty()).ok_or_else(missing)?;

    Ok(NewTestCategory {
        name,
        description,
        duration,
        question_count,
        color,
        icon,
    })
}

async fn list_categories(State(state): State<SharedState>) -> ApiResult<Json<Vec<TestCategory>>> {
    Ok(Json(state.storage.list_test_categories().await?))
}

async fn get_category(
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<TestCategory>> {
    let id = parse_id(&raw_id, "test category")?;
    let category = state
        .storage
        .get_test_category(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Test category not found"))?;
    Ok(Json(category))
}

async fn create_category(
    _session: UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<CategoryPayload>,
) -> ApiResult<impl IntoResponse> {
    let fields = required_fields(payload)?;
    let category = state.storage.create_test_category(fields).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    _session: UserSession,
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
    Json(payload): Json<CategoryPayload>,
) -> ApiResult<Json<TestCategory>> {
    let id = parse_id(&raw_id, "test category")?;
    let fields = required_fields(payload)?;
    let category = state
        .storage
        .update_test_category(id, fields)
        .await?
        .ok_or_else(|| ApiError::not_found("Test category not found"))?;
    Ok(Json(category))
}

async fn delete_category(
    _session: UserSession,
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&raw_id, "test category")?;
    if !state.storage.delete_test_category(id).await? {
        return Err(ApiError::not_found("Test category not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
