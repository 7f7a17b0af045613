use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Absent for accounts created through OAuth.
    pub password_hash: Option<String>,
    pub verified: bool,
    pub verification_code: Option<String>,
    pub verification_code_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub category: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub read_time: i32,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Faq {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TestCategory {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub duration: i32,
    pub question_count: i32,
    pub color: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestQuestion {
    pub id: Uuid,
    pub category_id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub category_id: Uuid,
    pub score: i32,
    pub total_questions: i32,
    /// Question index (as a decimal string) to the answer the user picked.
    pub answers: HashMap<String, String>,
    pub feedback: Option<String>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoAnalysis {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub scenario: String,
    pub overall_score: i32,
    pub eye_contact_score: i32,
    pub facial_expression_score: i32,
    pub gesture_score: i32,
    pub posture_score: i32,
    pub feedback: Vec<String>,
    pub created_at: DateTime<Utc>,
}
