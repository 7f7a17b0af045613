//! Relay to the external video-scoring service.
//!
//! The remote call is slow (whole-clip inference), so the client carries a
//! long timeout. When the service is unreachable or errors, the caller gets
//! the deterministic zero-score outcome with a recognizable failure phrase
//! in `feedback[0]` -- never an invented score. An overall score of 0 plus
//! that phrase means "could not analyze", not "analyzed and scored 0".

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

pub const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(120);

pub const ANALYSIS_FAILED_FEEDBACK: &str =
    "Analysis failed. Please ensure your video contains a clear view of one person.";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub overall_score: i32,
    pub eye_contact_score: i32,
    pub facial_expression_score: i32,
    pub gesture_score: i32,
    pub posture_score: i32,
    pub feedback: Vec<String>,
}

impl AnalysisOutcome {
    /// The sentinel returned whenever the remote service cannot score a clip.
    pub fn failure() -> Self {
        Self {
            overall_score: 0,
            eye_contact_score: 0,
            facial_expression_score: 0,
            gesture_score: 0,
            posture_score: 0,
            feedback: vec![ANALYSIS_FAILED_FEEDBACK.to_string()],
        }
    }

    /// Remote scores are specified as 0-100; anything outside is clamped.
    fn normalized(mut self) -> Self {
        for score in [
            &mut self.overall_score,
            &mut self.eye_contact_score,
            &mut self.facial_expression_score,
            &mut self.gesture_score,
            &mut self.posture_score,
        ] {
            *score = (*score).clamp(0, 100);
        }
        self
    }
}

#[derive(Clone)]
pub struct AnalysisClient {
    http: reqwest::Client,
    endpoint: String,
}

impl AnalysisClient {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        Self { http, endpoint }
    }

    pub fn from_env() -> Self {
        let endpoint = std::env::var("AI_SERVICE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8000/analyze".to_string());
        Self::new(endpoint, ANALYSIS_TIMEOUT)
    }

    /// Scores a clip, falling back to the zero-score sentinel on any failure.
    pub async fn analyze(&self, video: &[u8], scenario: &str, duration: f64) -> AnalysisOutcome {
        match self.request(video, scenario, duration).await {
            Ok(outcome) => outcome.normalized(),
            Err(err) => {
                tracing::warn!("video analysis failed: {err:#}");
                AnalysisOutcome::failure()
            }
        }
    }

    async fn request(
        &self,
        video: &[u8],
        scenario: &str,
        duration: f64,
    ) -> Result<AnalysisOutcome> {
        let payload = json!({
            "video_path": general_purpose::STANDARD.encode(video),
            "scenario": scenario,
            "duration": duration,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .context("analysis service unreachable")?
            .error_for_status()
            .context("analysis service returned an error")?;

        response
            .json::<AnalysisOutcome>()
            .await
            .context("analysis service returned an unreadable body")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_outcome_is_the_zero_sentinel() {
        let outcome = AnalysisOutcome::failure();
        assert_eq!(outcome.overall_score, 0);
        assert_eq!(outcome.eye_contact_score, 0);
        assert_eq!(outcome.feedback[0], ANALYSIS_FAILED_FEEDBACK);
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        let outcome = AnalysisOutcome {
            overall_score: 140,
            eye_contact_score: -5,
            facial_expression_score: 100,
            gesture_score: 55,
            posture_score: 101,
            feedback: vec![],
        }
        .normalized();
        assert_eq!(outcome.overall_score, 100);
        assert_eq!(outcome.eye_contact_score, 0);
        assert_eq!(outcome.posture_score, 100);
        assert_eq!(outcome.gesture_score, 55);
    }

    #[test]
    fn outcome_uses_the_wire_field_names() {
        let parsed: AnalysisOutcome = serde_json::from_value(json!({
            "overallScore": 82,
            "eyeContactScore": 80,
            "facialExpressionScore": 85,
            "gestureScore": 78,
            "postureScore": 84,
            "feedback": ["Good eye contact - try to maintain it more consistently throughout"],
            "confidence": 0.9
        }))
        .unwrap();
        assert_eq!(parsed.overall_score, 82);
        assert_eq!(parsed.feedback.len(), 1);
    }

    #[tokio::test]
    async fn unreachable_service_yields_the_sentinel() {
        let client = AnalysisClient::new(
            "http://127.0.0.1:1/analyze".to_string(),
            Duration::from_secs(1),
        );
        let outcome = client.analyze(b"not a real clip", "Free Practice", 5.0).await;
        assert_eq!(outcome.overall_score, 0);
        assert_eq!(outcome.feedback[0], ANALYSIS_FAILED_FEEDBACK);
    }
}
