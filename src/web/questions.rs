use crate::domain::models::TestQuestion;
use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;
use crate::storage::NewTestQuestion;
use crate::web::{parse_id, session::UserSession};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    pub category_id: Option<Uuid>,
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<String>,
    pub explanation: Option<String>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_questions).post(create_question))
        .route(
            "/:id",
            get(questions_for_category)
                .put(update_question)
                .delete(delete_question),
        )
        .with_state(state)
}

/// Full validation for create and update; both take the complete field set.
/// Options are kept in submitted order with blanks dropped, and the correct
/// answer must survive that trim.
fn validated_fields(payload: QuestionPayload) -> Result<NewTestQuestion, ApiError> {
    let (Some(category_id), Some(question), Some(options), Some(correct_answer)) = (
        payload.category_id,
        payload.question.filter(|q| !q.trim().is_empty()),
        payload.options,
        payload.correct_answer,
    ) else {
        return Err(ApiError::validation(
            "All fields are required: question, options, correctAnswer, categoryId",
        ));
    };

    let options: Vec<String> = options
        .iter()
        .map(|opt| opt.trim())
        .filter(|opt| !opt.is_empty())
        .map(str::to_string)
        .collect();
    if options.len() < 2 {
        return Err(ApiError::validation(
            "Options must be an array with at least 2 non-empty strings.",
        ));
    }

    let correct_answer = correct_answer.trim().to_string();
    if !options.contains(&correct_answer) {
        return Err(ApiError::validation(
            "Correct answer must be one of the options.",
        ));
    }

    Ok(NewTestQuestion {
        category_id,
        question: question.trim().to_string(),
        options,
        correct_answer,
        explanation: payload.explanation,
    })
}

async fn list_questions(State(state): State<SharedState>) -> ApiResult<Json<Vec<TestQuestion>>> {
    Ok(Json(state.storage.list_test_questions().await?))
}

/// GET /test-questions/:id lists the questions owned by category `id`.
async fn questions_for_category(
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let category_id = parse_id(&raw_id, "test category")?;
    let questions = state
        .storage
        .list_questions_for_category(category_id)
        .await?;
    Ok(Json(json!({ "questions": questions })))
}

async fn create_question(
    _session: UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<QuestionPayload>,
) -> ApiResult<impl IntoResponse> {
    let fields = validated_fields(payload)?;
    if state
        .storage
        .get_test_category(fields.category_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("Test category not found"));
    }

    let question = state.storage.create_test_question(fields).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

async fn update_question(
    _session: UserSession,
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
    Json(payload): Json<QuestionPayload>,
) -> ApiResult<Json<TestQuestion>> {
    let id = parse_id(&raw_id, "test question")?;
    let fields = validated_fields(payload)?;
    if state
        .storage
        .get_test_category(fields.category_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("Test category not found"));
    }

    let question = state
        .storage
        .update_test_question(id, fields)
        .await?
        .ok_or_else(|| ApiError::not_found("Test question not found"))?;
    Ok(Json(question))
}

async fn delete_question(
    _session: UserSession,
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&raw_id, "test question")?;
    if !state.storage.delete_test_question(id).await? {
        return Err(ApiError::not_found("Test question not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(options: &[&str], correct: &str) -> QuestionPayload {
        QuestionPayload {
            category_id: Some(Uuid::new_v4()),
            question: Some("What does sustained eye contact convey?".to_string()),
            options: Some(options.iter().map(|s| s.to_string()).collect()),
            correct_answer: Some(correct.to_string()),
            explanation: None,
        }
    }

    #[test]
    fn blank_options_are_dropped_before_the_minimum_check() {
        let result = validated_fields(payload(&["Confidence", "  ", ""], "Confidence"));
        assert!(result.is_err());

        let fields = validated_fields(payload(&["Confidence", "Evasion", " "], "Confidence")).unwrap();
        assert_eq!(fields.options, vec!["Confidence", "Evasion"]);
    }

    #[test]
    fn correct_answer_must_be_an_option() {
        assert!(validated_fields(payload(&["Confidence", "Evasion"], "Sincerity")).is_err());
        // Whitespace around the correct answer is forgiven.
        let fields = validated_fields(payload(&["Confidence", "Evasion"], " Confidence ")).unwrap();
        assert_eq!(fields.correct_answer, "Confidence");
    }

    #[test]
    fn every_field_is_required() {
        let mut missing = payload(&["A", "B"], "A");
        missing.category_id = None;
        assert!(validated_fields(missing).is_err());

        let mut blank_question = payload(&["A", "B"], "A");
        blank_question.question = Some("   ".to_string());
        assert!(validated_fields(blank_question).is_err());
    }
}
