//! Production [`Storage`] backed by Postgres. Multi-row invariants
//! (category -> questions, user -> sessions) ride on the schema's
//! ON DELETE CASCADE rules.

use super::{
    ArticlePatch, FaqPatch, NewArticle, NewFaq, NewTestCategory, NewTestQuestion, NewTestResult,
    NewUser, NewVideoAnalysis, Storage,
};
use crate::domain::models::{
    Article, Faq, Session, TestCategory, TestQuestion, TestResult, User, VideoAnalysis,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, verified, verification_code, \
                            verification_code_expires_at, created_at, updated_at";

const ARTICLE_COLUMNS: &str =
    "id, title, excerpt, content, category, author, published_at, read_time, image_url";

#[derive(FromRow)]
struct TestQuestionRow {
    id: Uuid,
    category_id: Uuid,
    question: String,
    options: Json<Vec<String>>,
    correct_answer: String,
    explanation: Option<String>,
}

impl From<TestQuestionRow> for TestQuestion {
    fn from(row: TestQuestionRow) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            question: row.question,
            options: row.options.0,
            correct_answer: row.correct_answer,
            explanation: row.explanation,
        }
    }
}

#[derive(FromRow)]
struct TestResultRow {
    id: Uuid,
    user_id: Option<Uuid>,
    category_id: Uuid,
    score: i32,
    total_questions: i32,
    answers: Json<HashMap<String, String>>,
    feedback: Option<String>,
    completed_at: DateTime<Utc>,
}

impl From<TestResultRow> for TestResult {
    fn from(row: TestResultRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            category_id: row.category_id,
            score: row.score,
            total_questions: row.total_questions,
            answers: row.answers.0,
            feedback: row.feedback,
            completed_at: row.completed_at,
        }
    }
}

#[derive(FromRow)]
struct VideoAnalysisRow {
    id: Uuid,
    user_id: Option<Uuid>,
    scenario: String,
    overall_score: i32,
    eye_contact_score: i32,
    facial_expression_score: i32,
    gesture_score: i32,
    posture_score: i32,
    feedback: Json<Vec<String>>,
    created_at: DateTime<Utc>,
}

impl From<VideoAnalysisRow> for VideoAnalysis {
    fn from(row: VideoAnalysisRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            scenario: row.scenario,
            overall_score: row.overall_score,
            eye_contact_score: row.eye_contact_score,
            facial_expression_score: row.facial_expression_score,
            gesture_score: row.gesture_score,
            posture_score: row.posture_score,
            feedback: row.feedback.0,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn create_user(&self, new: NewUser) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, verified,
                               verification_code, verification_code_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.verified)
        .bind(&new.verification_code)
        .bind(new.verification_code_expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn mark_user_verified(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET verified = TRUE,
                verification_code = NULL,
                verification_code_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_session(&self, user_id: Uuid, expires_at: DateTime<Utc>) -> Result<Session> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, created_at, expires_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn delete_session(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_articles(
        &self,
        search: Option<&str>,
        category: Option<&str>,
    ) -> Result<Vec<Article>> {
        let pattern = search.map(|term| format!("%{term}%"));
        let articles = sqlx::query_as::<_, Article>(&format!(
            r#"
            SELECT {ARTICLE_COLUMNS}
            FROM articles
            WHERE ($1::TEXT IS NULL OR title ILIKE $1 OR excerpt ILIKE $1)
              AND ($2::TEXT IS NULL OR category = $2)
            ORDER BY published_at DESC
            "#
        ))
        .bind(pattern)
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(articles)
    }

    async fn get_article(&self, id: Uuid) -> Result<Option<Article>> {
        let article = sqlx::query_as::<_, Article>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(article)
    }

    async fn create_article(&self, new: NewArticle) -> Result<Article> {
        let article = sqlx::query_as::<_, Article>(&format!(
            r#"
            INSERT INTO articles (id, title, excerpt, content, category, author,
                                  published_at, read_time, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ARTICLE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.excerpt)
        .bind(&new.content)
        .bind(&new.category)
        .bind(&new.author)
        .bind(new.published_at)
        .bind(new.read_time)
        .bind(&new.image_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(article)
    }

    async fn update_article(&self, id: Uuid, patch: ArticlePatch) -> Result<Option<Article>> {
        let Some(existing) = self.get_article(id).await? else {
            return Ok(None);
        };
        let article = sqlx::query_as::<_, Article>(&format!(
            r#"
            UPDATE articles
            SET title = $2, excerpt = $3, content = $4, category = $5, author = $6,
                published_at = $7, read_time = $8, image_url = $9
            WHERE id = $1
            RETURNING {ARTICLE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.title.unwrap_or(existing.title))
        .bind(patch.excerpt.unwrap_or(existing.excerpt))
        .bind(patch.content.unwrap_or(existing.content))
        .bind(patch.category.unwrap_or(existing.category))
        .bind(patch.author.unwrap_or(existing.author))
        .bind(patch.published_at.unwrap_or(existing.published_at))
        .bind(patch.read_time.unwrap_or(existing.read_time))
        .bind(patch.image_url.or(existing.image_url))
        .fetch_one(&self.pool)
        .await?;
        Ok(Some(article))
    }

    async fn delete_article(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_faqs(&self, search: Option<&str>, category: Option<&str>) -> Result<Vec<Faq>> {
        let pattern = search.map(|term| format!("%{term}%"));
        let faqs = sqlx::query_as::<_, Faq>(
            r#"
            SELECT id, question, answer, category
            FROM faqs
            WHERE ($1::TEXT IS NULL OR question ILIKE $1 OR answer ILIKE $1)
              AND ($2::TEXT IS NULL OR category = $2)
            ORDER BY created_at ASC
            "#,
        )
        .bind(pattern)
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(faqs)
    }

    async fn get_faq(&self, id: Uuid) -> Result<Option<Faq>> {
        let faq = sqlx::query_as::<_, Faq>(
            "SELECT id, question, answer, category FROM faqs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(faq)
    }

    async fn create_faq(&self, new: NewFaq) -> Result<Faq> {
        let faq = sqlx::query_as::<_, Faq>(
            r#"
            INSERT INTO faqs (id, question, answer, category)
            VALUES ($1, $2, $3, $4)
            RETURNING id, question, answer, category
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.question)
        .bind(&new.answer)
        .bind(&new.category)
        .fetch_one(&self.pool)
        .await?;
        Ok(faq)
    }

    async fn update_faq(&self, id: Uuid, patch: FaqPatch) -> Result<Option<Faq>> {
        let Some(existing) = self.get_faq(id).await? else {
            return Ok(None);
        };
        let faq = sqlx::query_as::<_, Faq>(
            r#"
            UPDATE faqs
            SET question = $2, answer = $3, category = $4
            WHERE id = $1
            RETURNING id, question, answer, category
            "#,
        )
        .bind(id)
        .bind(patch.question.unwrap_or(existing.question))
        .bind(patch.answer.unwrap_or(existing.answer))
        .bind(patch.category.unwrap_or(existing.category))
        .fetch_one(&self.pool)
        .await?;
        Ok(Some(faq))
    }

    async fn delete_faq(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM faqs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_test_categories(&self) -> Result<Vec<TestCategory>> {
        let categories = sqlx::query_as::<_, TestCategory>(
            r#"
            SELECT id, name, description, duration, question_count, color, icon
            FROM test_categories
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn get_test_category(&self, id: Uuid) -> Result<Option<TestCategory>> {
        let category = sqlx::query_as::<_, TestCategory>(
            r#"
            SELECT id, name, description, duration, question_count, color, icon
            FROM test_categories
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn create_test_category(&self, new: NewTestCategory) -> Result<TestCategory> {
        let category = sqlx::query_as::<_, TestCategory>(
            r#"
            INSERT INTO test_categories (id, name, description, duration, question_count, color, icon)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, description, duration, question_count, color, icon
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.duration)
        .bind(new.question_count)
        .bind(&new.color)
        .bind(&new.icon)
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }

    async fn update_test_category(
        &self,
        id: Uuid,
        fields: NewTestCategory,
    ) -> Result<Option<TestCategory>> {
        let category = sqlx::query_as::<_, TestCategory>(
            r#"
            UPDATE test_categories
            SET name = $2, description = $3, duration = $4, question_count = $5,
                color = $6, icon = $7
            WHERE id = $1
            RETURNING id, name, description, duration, question_count, color, icon
            "#,
        )
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(fields.duration)
        .bind(fields.question_count)
        .bind(&fields.color)
        .bind(&fields.icon)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn delete_test_category(&self, id: Uuid) -> Result<bool> {
        // Owned questions go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM test_categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_test_questions(&self) -> Result<Vec<TestQuestion>> {
        let rows = sqlx::query_as::<_, TestQuestionRow>(
            r#"
            SELECT id, category_id, question, options, correct_answer, explanation
            FROM test_questions
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_questions_for_category(&self, category_id: Uuid) -> Result<Vec<TestQuestion>> {
        let rows = sqlx::query_as::<_, TestQuestionRow>(
            r#"
            SELECT id, category_id, question, options, correct_answer, explanation
            FROM test_questions
            WHERE category_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_test_question(&self, id: Uuid) -> Result<Option<TestQuestion>> {
        let row = sqlx::query_as::<_, TestQuestionRow>(
            r#"
            SELECT id, category_id, question, options, correct_answer, explanation
            FROM test_questions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn create_test_question(&self, new: NewTestQuestion) -> Result<TestQuestion> {
        let row = sqlx::query_as::<_, TestQuestionRow>(
            r#"
            INSERT INTO test_questions (id, category_id, question, options, correct_answer, explanation)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, category_id, question, options, correct_answer, explanation
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.category_id)
        .bind(&new.question)
        .bind(Json(&new.options))
        .bind(&new.correct_answer)
        .bind(&new.explanation)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn update_test_question(
        &self,
        id: Uuid,
        fields: NewTestQuestion,
    ) -> Result<Option<TestQuestion>> {
        let row = sqlx::query_as::<_, TestQuestionRow>(
            r#"
            UPDATE test_questions
            SET category_id = $2, question = $3, options = $4, correct_answer = $5,
                explanation = $6
            WHERE id = $1
            RETURNING id, category_id, question, options, correct_answer, explanation
            "#,
        )
        .bind(id)
        .bind(fields.category_id)
        .bind(&fields.question)
        .bind(Json(&fields.options))
        .bind(&fields.correct_answer)
        .bind(&fields.explanation)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn delete_test_question(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM test_questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_test_result(&self, new: NewTestResult) -> Result<TestResult> {
        let row = sqlx::query_as::<_, TestResultRow>(
            r#"
            INSERT INTO test_results (id, user_id, category_id, score, total_questions,
                                      answers, feedback, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING id, user_id, category_id, score, total_questions, answers,
                      feedback, completed_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.category_id)
        .bind(new.score)
        .bind(new.total_questions)
        .bind(Json(&new.answers))
        .bind(&new.feedback)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn list_test_results(&self, user_id: Option<Uuid>) -> Result<Vec<TestResult>> {
        let rows = sqlx::query_as::<_, TestResultRow>(
            r#"
            SELECT id, user_id, category_id, score, total_questions, answers,
                   feedback, completed_at
            FROM test_results
            WHERE ($1::UUID IS NULL OR user_id = $1)
            ORDER BY completed_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_test_result(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM test_results WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_video_analysis(&self, new: NewVideoAnalysis) -> Result<VideoAnalysis> {
        let row = sqlx::query_as::<_, VideoAnalysisRow>(
            r#"
            INSERT INTO video_analyses (id, user_id, scenario, overall_score, eye_contact_score,
                                        facial_expression_score, gesture_score, posture_score,
                                        feedback, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            RETURNING id, user_id, scenario, overall_score, eye_contact_score,
                      facial_expression_score, gesture_score, posture_score, feedback, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(&new.scenario)
        .bind(new.overall_score)
        .bind(new.eye_contact_score)
        .bind(new.facial_expression_score)
        .bind(new.gesture_score)
        .bind(new.posture_score)
        .bind(Json(&new.feedback))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn list_video_analyses(&self, user_id: Option<Uuid>) -> Result<Vec<VideoAnalysis>> {
        let rows = sqlx::query_as::<_, VideoAnalysisRow>(
            r#"
            SELECT id, user_id, scenario, overall_score, eye_contact_score,
                   facial_expression_score, gesture_score, posture_score, feedback, created_at
            FROM video_analyses
            WHERE ($1::UUID IS NULL OR user_id = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
