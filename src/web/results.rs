use crate::domain::models::TestResult;
use crate::error::{ApiError, ApiResult};
use crate::services::assessment;
use crate::state::SharedState;
use crate::storage::NewTestResult;
use crate::web::{parse_id, session::UserSession};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

/// A submitted quiz. Any client-side score or feedback is ignored; the
/// server recounts against the stored questions.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResultRequest {
    pub category_id: Option<Uuid>,
    pub total_questions: Option<i32>,
    pub answers: Option<HashMap<String, String>>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_results).post(submit_result))
        .route("/:id", delete(delete_result))
        .with_state(state)
}

async fn submit_result(
    session: UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<SubmitResultRequest>,
) -> ApiResult<impl IntoResponse> {
    let (Some(category_id), Some(total_questions), Some(answers)) =
        (payload.category_id, payload.total_questions, payload.answers)
    else {
        return Err(ApiError::validation(
            "All fields are required: categoryId, totalQuestions, answers",
        ));
    };
    if total_questions < 1 {
        return Err(ApiError::validation("totalQuestions must be at least 1"));
    }

    if state
        .storage
        .get_test_category(category_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("Test category not found"));
    }

    let questions = state
        .storage
        .list_questions_for_category(category_id)
        .await?;
    let score = assessment::compute_score(&questions, &answers, total_questions);
    let feedback = assessment::feedback_for(score, total_questions);

    let result = state
        .storage
        .create_test_result(NewTestResult {
            user_id: Some(session.user_id),
            category_id,
            score,
            total_questions,
            answers,
            feedback: feedback.to_string(),
        })
        .await?;

    tracing::info!(
        "user {} scored {}/{} in category {}",
        session.user_id,
        score,
        total_questions,
        category_id
    );
    Ok((StatusCode::CREATED, Json(result)))
}

async fn list_results(
    session: UserSession,
    State(state): State<SharedState>,
) -> ApiResult<Json<serde_json::Value>> {
    let results: Vec<TestResult> = state
        .storage
        .list_test_results(Some(session.user_id))
        .await?;
    Ok(Json(json!({ "results": results })))
}

async fn delete_result(
    _session: UserSession,
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&raw_id, "test result")?;
    if !state.storage.delete_test_result(id).await? {
        return Err(ApiError::not_found("Test result not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
