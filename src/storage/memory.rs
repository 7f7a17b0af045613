//! In-memory [`Storage`] used as a test double. Never wired into `main`.

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
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    sessions: Vec<Session>,
    articles: Vec<Article>,
    faqs: Vec<Faq>,
    categories: Vec<TestCategory>,
    questions: Vec<TestQuestion>,
    results: Vec<TestResult>,
    analyses: Vec<VideoAnalysis>,
}

#[derive(Default)]
pub struct MemStorage {
    inner: RwLock<Inner>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl Storage for MemStorage {
    async fn create_user(&self, new: NewUser) -> Result<User> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            verified: new.verified,
            verification_code: new.verification_code,
            verification_code_expires_at: new.verification_code_expires_at,
            created_at: now,
            updated_at: now,
        };
        self.inner.write().await.users.push(user.clone());
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.users.retain(|u| u.id != id);
        inner.sessions.retain(|s| s.user_id != id);
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn mark_user_verified(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == id) {
            user.verified = true;
            user.verification_code = None;
            user.verification_code_expires_at = None;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn create_session(&self, user_id: Uuid, expires_at: DateTime<Utc>) -> Result<Session> {
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            created_at: Utc::now(),
            expires_at,
        };
        self.inner.write().await.sessions.push(session.clone());
        Ok(session)
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>> {
        let inner = self.inner.read().await;
        Ok(inner.sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn delete_session(&self, id: Uuid) -> Result<()> {
        self.inner.write().await.sessions.retain(|s| s.id != id);
        Ok(())
    }

    async fn list_articles(
        &self,
        search: Option<&str>,
        category: Option<&str>,
    ) -> Result<Vec<Article>> {
        let inner = self.inner.read().await;
        let mut articles: Vec<Article> = inner
            .articles
            .iter()
            .filter(|a| match search {
                Some(term) => contains_ci(&a.title, term) || contains_ci(&a.excerpt, term),
                None => true,
            })
            .filter(|a| match category {
                Some(cat) => a.category == cat,
                None => true,
            })
            .cloned()
            .collect();
        articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(articles)
    }

    async fn get_article(&self, id: Uuid) -> Result<Option<Article>> {
        let inner = self.inner.read().await;
        Ok(inner.articles.iter().find(|a| a.id == id).cloned())
    }

    async fn create_article(&self, new: NewArticle) -> Result<Article> {
        let article = Article {
            id: Uuid::new_v4(),
            title: new.title,
            excerpt: new.excerpt,
            content: new.content,
            category: new.category,
            author: new.author,
            published_at: new.published_at,
            read_time: new.read_time,
            image_url: new.image_url,
        };
        self.inner.write().await.articles.push(article.clone());
        Ok(article)
    }

    async fn update_article(&self, id: Uuid, patch: ArticlePatch) -> Result<Option<Article>> {
        let mut inner = self.inner.write().await;
        let Some(article) = inner.articles.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        if let Some(title) = patch.title {
            article.title = title;
        }
        if let Some(excerpt) = patch.excerpt {
            article.excerpt = excerpt;
        }
        if let Some(content) = patch.content {
            article.content = content;
        }
        if let Some(category) = patch.category {
            article.category = category;
        }
        if let Some(author) = patch.author {
            article.author = author;
        }
        if let Some(published_at) = patch.published_at {
            article.published_at = published_at;
        }
        if let Some(read_time) = patch.read_time {
            article.read_time = read_time;
        }
        if let Some(image_url) = patch.image_url {
            article.image_url = Some(image_url);
        }
        Ok(Some(article.clone()))
    }

    async fn delete_article(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.articles.len();
        inner.articles.retain(|a| a.id != id);
        Ok(inner.articles.len() < before)
    }

    async fn list_faqs(&self, search: Option<&str>, category: Option<&str>) -> Result<Vec<Faq>> {
        let inner = self.inner.read().await;
        Ok(inner
            .faqs
            .iter()
            .filter(|f| match search {
                Some(term) => contains_ci(&f.question, term) || contains_ci(&f.answer, term),
                None => true,
            })
            .filter(|f| match category {
                Some(cat) => f.category == cat,
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn get_faq(&self, id: Uuid) -> Result<Option<Faq>> {
        let inner = self.inner.read().await;
        Ok(inner.faqs.iter().find(|f| f.id == id).cloned())
    }

    async fn create_faq(&self, new: NewFaq) -> Result<Faq> {
        let faq = Faq {
            id: Uuid::new_v4(),
            question: new.question,
            answer: new.answer,
            category: new.category,
        };
        self.inner.write().await.faqs.push(faq.clone());
        Ok(faq)
    }

    async fn update_faq(&self, id: Uuid, patch: FaqPatch) -> Result<Option<Faq>> {
        let mut inner = self.inner.write().await;
        let Some(faq) = inner.faqs.iter_mut().find(|f| f.id == id) else {
            return Ok(None);
        };
        if let Some(question) = patch.question {
            faq.question = question;
        }
        if let Some(answer) = patch.answer {
            faq.answer = answer;
        }
        if let Some(category) = patch.category {
            faq.category = category;
        }
        Ok(Some(faq.clone()))
    }

    async fn delete_faq(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.faqs.len();
        inner.faqs.retain(|f| f.id != id);
        Ok(inner.faqs.len() < before)
    }

    async fn list_test_categories(&self) -> Result<Vec<TestCategory>> {
        Ok(self.inner.read().await.categories.clone())
    }

    async fn get_test_category(&self, id: Uuid) -> Result<Option<TestCategory>> {
        let inner = self.inner.read().await;
        Ok(inner.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn create_test_category(&self, new: NewTestCategory) -> Result<TestCategory> {
        let category = TestCategory {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            duration: new.duration,
            question_count: new.question_count,
            color: new.color,
            icon: new.icon,
        };
        self.inner.write().await.categories.push(category.clone());
        Ok(category)
    }

    async fn update_test_category(
        &self,
        id: Uuid,
        fields: NewTestCategory,
    ) -> Result<Option<TestCategory>> {
        let mut inner = self.inner.write().await;
        let Some(category) = inner.categories.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        category.name = fields.name;
        category.description = fields.description;
        category.duration = fields.duration;
        category.question_count = fields.question_count;
        category.color = fields.color;
        category.icon = fields.icon;
        Ok(Some(category.clone()))
    }

    async fn delete_test_category(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.categories.len();
        inner.categories.retain(|c| c.id != id);
        let removed = inner.categories.len() < before;
        if removed {
            // Mirrors the ON DELETE CASCADE the schema enforces.
            inner.questions.retain(|q| q.category_id != id);
        }
        Ok(removed)
    }

    async fn list_test_questions(&self) -> Result<Vec<TestQuestion>> {
        Ok(self.inner.read().await.questions.clone())
    }

    async fn list_questions_for_category(&self, category_id: Uuid) -> Result<Vec<TestQuestion>> {
        let inner = self.inner.read().await;
        Ok(inner
            .questions
            .iter()
            .filter(|q| q.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn get_test_question(&self, id: Uuid) -> Result<Option<TestQuestion>> {
        let inner = self.inner.read().await;
        Ok(inner.questions.iter().find(|q| q.id == id).cloned())
    }

    async fn create_test_question(&self, new: NewTestQuestion) -> Result<TestQuestion> {
        let question = TestQuestion {
            id: Uuid::new_v4(),
            category_id: new.category_id,
            question: new.question,
            options: new.options,
            correct_answer: new.correct_answer,
            explanation: new.explanation,
        };
        self.inner.write().await.questions.push(question.clone());
        Ok(question)
    }

    async fn update_test_question(
        &self,
        id: Uuid,
        fields: NewTestQuestion,
    ) -> Result<Option<TestQuestion>> {
        let mut inner = self.inner.write().await;
        let Some(question) = inner.questions.iter_mut().find(|q| q.id == id) else {
            return Ok(None);
        };
        question.category_id = fields.category_id;
        question.question = fields.question;
        question.options = fields.options;
        question.correct_answer = fields.correct_answer;
        question.explanation = fields.explanation;
        Ok(Some(question.clone()))
    }

    async fn delete_test_question(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.questions.len();
        inner.questions.retain(|q| q.id != id);
        Ok(inner.questions.len() < before)
    }

    async fn create_test_result(&self, new: NewTestResult) -> Result<TestResult> {
        let result = TestResult {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            category_id: new.category_id,
            score: new.score,
            total_questions: new.total_questions,
            answers: new.answers,
            feedback: Some(new.feedback),
            completed_at: Utc::now(),
        };
        self.inner.write().await.results.push(result.clone());
        Ok(result)
    }

    async fn list_test_results(&self, user_id: Option<Uuid>) -> Result<Vec<TestResult>> {
        let inner = self.inner.read().await;
        let mut results: Vec<TestResult> = inner
            .results
            .iter()
            .filter(|r| match user_id {
                Some(uid) => r.user_id == Some(uid),
                None => true,
            })
            .cloned()
            .collect();
        results.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(results)
    }

    async fn delete_test_result(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.results.len();
        inner.results.retain(|r| r.id != id);
        Ok(inner.results.len() < before)
    }

    async fn create_video_analysis(&self, new: NewVideoAnalysis) -> Result<VideoAnalysis> {
        let analysis = VideoAnalysis {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            scenario: new.scenario,
            overall_score: new.overall_score,
            eye_contact_score: new.eye_contact_score,
            facial_expression_score: new.facial_expression_score,
            gesture_score: new.gesture_score,
            posture_score: new.posture_score,
            feedback: new.feedback,
            created_at: Utc::now(),
        };
        self.inner.write().await.analyses.push(analysis.clone());
        Ok(analysis)
    }

    async fn list_video_analyses(&self, user_id: Option<Uuid>) -> Result<Vec<VideoAnalysis>> {
        let inner = self.inner.read().await;
        let mut analyses: Vec<VideoAnalysis> = inner
            .analyses
            .iter()
            .filter(|a| match user_id {
                Some(uid) => a.user_id == Some(uid),
                None => true,
            })
            .cloned()
            .collect();
        analyses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(analyses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::HashMap;

    fn article(title: &str, excerpt: &str, category: &str) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            excerpt: excerpt.to_string(),
            content: "Long enough body text for the article.".to_string(),
            category: category.to_string(),
            author: "Unknown".to_string(),
            published_at: Utc::now(),
            read_time: 1,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn article_search_is_case_insensitive() {
        let storage = MemStorage::new();
        storage
            .create_article(article("Active Listening", "Hearing well", "Listening"))
            .await
            .unwrap();
        storage
            .create_article(article("Body Language", "Standing tall", "Nonverbal"))
            .await
            .unwrap();

        let hits = storage.list_articles(Some("listen"), None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Active Listening");

        let hits = storage
            .list_articles(None, Some("Nonverbal"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Body Language");
    }

    #[tokio::test]
    async fn articles_come_back_newest_first() {
        let storage = MemStorage::new();
        let mut old = article("Old", "first", "General");
        old.published_at = Utc::now() - Duration::days(2);
        storage.create_article(old).await.unwrap();
        storage
            .create_article(article("New", "second", "General"))
            .await
            .unwrap();

        let all = storage.list_articles(None, None).await.unwrap();
        assert_eq!(all[0].title, "New");
        assert_eq!(all[1].title, "Old");
    }

    #[tokio::test]
    async fn deleting_category_removes_its_questions() {
        let storage = MemStorage::new();
        let category = storage
            .create_test_category(NewTestCategory {
                name: "Body Language".to_string(),
                description: "Reading the room".to_string(),
                duration: 10,
                question_count: 2,
                color: "blue".to_string(),
                icon: "eye".to_string(),
            })
            .await
            .unwrap();
        storage
            .create_test_question(NewTestQuestion {
                category_id: category.id,
                question: "What does crossed arms usually signal?".to_string(),
                options: vec!["Openness".to_string(), "Defensiveness".to_string()],
                correct_answer: "Defensiveness".to_string(),
                explanation: None,
            })
            .await
            .unwrap();

        assert!(storage.delete_test_category(category.id).await.unwrap());
        assert!(storage
            .list_questions_for_category(category.id)
            .await
            .unwrap()
            .is_empty());
        assert!(storage.list_test_questions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_is_reported_once() {
        let storage = MemStorage::new();
        let created = storage
            .create_article(article("Once", "only", "General"))
            .await
            .unwrap();
        assert!(storage.delete_article(created.id).await.unwrap());
        assert!(!storage.delete_article(created.id).await.unwrap());
    }

    #[tokio::test]
    async fn results_are_scoped_by_user() {
        let storage = MemStorage::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        for (user, score) in [(alice, 2), (bob, 1)] {
            storage
                .create_test_result(NewTestResult {
                    user_id: Some(user),
                    category_id: Uuid::new_v4(),
                    score,
                    total_questions: 2,
                    answers: HashMap::new(),
                    feedback: "Fair performance.".to_string(),
                })
                .await
                .unwrap();
        }

        let mine = storage.list_test_results(Some(alice)).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].score, 2);

        let all = storage.list_test_results(None).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
