use crate::domain::models::VideoAnalysis;
use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;
use crate::storage::NewVideoAnalysis;
use crate::web::session::UserSession;
use axum::{
    extract::{DefaultBodyLimit, State},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::json;

/// Raw clips arrive base64-encoded in the JSON body, so the default body
/// cap is far too small here.
const MAX_VIDEO_BODY_BYTES: usize = 50 * 1024 * 1024;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub video_data: Option<String>,
    pub scenario: Option<String>,
    pub duration: Option<f64>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_analyses).post(analyze))
        .layer(DefaultBodyLimit::max(MAX_VIDEO_BODY_BYTES))
        .with_state(state)
}

async fn analyze(
    session: UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<AnalyzeRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let (Some(video_data), Some(scenario), Some(duration)) =
        (payload.video_data, payload.scenario, payload.duration)
    else {
        return Err(ApiError::validation(
            "Missing videoData, scenario, or duration",
        ));
    };

    let video = general_purpose::STANDARD
        .decode(video_data.as_bytes())
        .map_err(|_| ApiError::validation("Invalid video data"))?;

    // Upstream failure resolves to the zero-score sentinel inside the
    // client, so this await cannot fail the request.
    let outcome = state.analyzer.analyze(&video, &scenario, duration).await;

    let analysis: VideoAnalysis = state
        .storage
        .create_video_analysis(NewVideoAnalysis {
            user_id: Some(session.user_id),
            scenario,
            overall_score: outcome.overall_score,
            eye_contact_score: outcome.eye_contact_score,
            facial_expression_score: outcome.facial_expression_score,
            gesture_score: outcome.gesture_score,
            posture_score: outcome.posture_score,
            feedback: outcome.feedback,
        })
        .await?;

    Ok(Json(json!({ "analysis": analysis })))
}

async fn list_analyses(
    session: UserSession,
    State(state): State<SharedState>,
) -> ApiResult<Json<Vec<VideoAnalysis>>> {
    let analyses = state
        .storage
        .list_video_analyses(Some(session.user_id))
        .await?;
    Ok(Json(analyses))
}
