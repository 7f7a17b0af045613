pub mod memory;
pub mod postgres;

use crate::domain::models::{
    Article, Faq, Session, TestCategory, TestQuestion, TestResult, User, VideoAnalysis,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub verified: bool,
    pub verification_code: Option<String>,
    pub verification_code_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub category: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub read_time: i32,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub read_time: Option<i32>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewFaq {
    pub question: String,
    pub answer: String,
    pub category: String,
}

#[derive(Debug, Clone, Default)]
pub struct FaqPatch {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTestCategory {
    pub name: String,
    pub description: String,
    pub duration: i32,
    pub question_count: i32,
    pub color: String,
    pub icon: String,
}

#[derive(Debug, Clone)]
pub struct NewTestQuestion {
    pub category_id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTestResult {
    pub user_id: Option<Uuid>,
    pub category_id: Uuid,
    pub score: i32,
    pub total_questions: i32,
    pub answers: HashMap<String, String>,
    pub feedback: String,
}

#[derive(Debug, Clone)]
pub struct NewVideoAnalysis {
    pub user_id: Option<Uuid>,
    pub scenario: String,
    pub overall_score: i32,
    pub eye_contact_score: i32,
    pub facial_expression_score: i32,
    pub gesture_score: i32,
    pub posture_score: i32,
    pub feedback: Vec<String>,
}

/// Persistence seam for the whole platform. Production runs on
/// [`postgres::PgStorage`]; [`memory::MemStorage`] exists for tests only.
///
/// Deletes report whether a row was actually removed so handlers can answer
/// a repeat delete with a clean 404 instead of a 500.
#[async_trait]
pub trait Storage: Send + Sync {
    // Users
    async fn create_user(&self, new: NewUser) -> Result<User>;
    async fn delete_user(&self, id: Uuid) -> Result<()>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;
    /// Sets `verified` and clears any pending code.
    async fn mark_user_verified(&self, id: Uuid) -> Result<()>;

    // Sessions
    async fn create_session(&self, user_id: Uuid, expires_at: DateTime<Utc>) -> Result<Session>;
    async fn find_session(&self, id: Uuid) -> Result<Option<Session>>;
    async fn delete_session(&self, id: Uuid) -> Result<()>;

    // Articles
    async fn list_articles(
        &self,
        search: Option<&str>,
        category: Option<&str>,
    ) -> Result<Vec<Article>>;
    async fn get_article(&self, id: Uuid) -> Result<Option<Article>>;
    async fn create_article(&self, new: NewArticle) -> Result<Article>;
    async fn update_article(&self, id: Uuid, patch: ArticlePatch) -> Result<Option<Article>>;
    async fn delete_article(&self, id: Uuid) -> Result<bool>;

    // FAQs
    async fn list_faqs(&self, search: Option<&str>, category: Option<&str>) -> Result<Vec<Faq>>;
    async fn get_faq(&self, id: Uuid) -> Result<Option<Faq>>;
    async fn create_faq(&self, new: NewFaq) -> Result<Faq>;
    async fn update_faq(&self, id: Uuid, patch: FaqPatch) -> Result<Option<Faq>>;
    async fn delete_faq(&self, id: Uuid) -> Result<bool>;

    // Test categories
    async fn list_test_categories(&self) -> Result<Vec<TestCategory>>;
    async fn get_test_category(&self, id: Uuid) -> Result<Option<TestCategory>>;
    async fn create_test_category(&self, new: NewTestCategory) -> Result<TestCategory>;
    async fn update_test_category(
        &self,
        id: Uuid,
        fields: NewTestCategory,
    ) -> Result<Option<TestCategory>>;
    /// Removes the category together with every question it owns.
    async fn delete_test_category(&self, id: Uuid) -> Result<bool>;

    // Test questions
    async fn list_test_questions(&self) -> Result<Vec<TestQuestion>>;
    async fn list_questions_for_category(&self, category_id: Uuid) -> Result<Vec<TestQuestion>>;
    async fn get_test_question(&self, id: Uuid) -> Result<Option<TestQuestion>>;
    async fn create_test_question(&self, new: NewTestQuestion) -> Result<TestQuestion>;
    async fn update_test_question(
        &self,
        id: Uuid,
        fields: NewTestQuestion,
    ) -> Result<Option<TestQuestion>>;
    async fn delete_test_question(&self, id: Uuid) -> Result<bool>;

    // Test results
    async fn create_test_result(&self, new: NewTestResult) -> Result<TestResult>;
    async fn list_test_results(&self, user_id: Option<Uuid>) -> Result<Vec<TestResult>>;
    async fn delete_test_result(&self, id: Uuid) -> Result<bool>;

    // Video analyses
    async fn create_video_analysis(&self, new: NewVideoAnalysis) -> Result<VideoAnalysis>;
    async fn list_video_analyses(&self, user_id: Option<Uuid>) -> Result<Vec<VideoAnalysis>>;
}
