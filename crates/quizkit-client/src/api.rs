//! Endpoint client for the quiz server.
//!
//! `QuizClient` wraps a [`RequestGateway`] and a [`ResponseCache`]. Question
//! and bank reads go through the cache; writes that change what a cached
//! read would return clear the affected key prefix.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde_json::json;
use tracing::instrument;

use quizkit_core::model::{
    AnswerMode, AnswerRequest, AnswerResult, AnswerStats, Favorite, LoginRequest, LoginResponse,
    PageResult, Question, QuestionBank, QuestionId, ServerSession, StartSessionResult, User,
    WrongQuestion, WrongQuestionStats,
};
use quizkit_core::token;
use quizkit_core::traits::QuizApi;
use quizkit_core::{QuizError, Result};

use crate::cache::{cache_key, ResponseCache};
use crate::gateway::{CallOptions, RequestGateway};

const BATCH_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// One page request for paginated listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub current: u32,
    pub size: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            current: 1,
            size: 20,
        }
    }
}

impl Page {
    fn query(&self) -> String {
        format!("current={}&size={}", self.current, self.size)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewFavorite<'a> {
    question_id: QuestionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    bank_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
}

pub struct QuizClient {
    gateway: Arc<RequestGateway>,
    cache: ResponseCache,
}

impl QuizClient {
    pub fn new(gateway: Arc<RequestGateway>) -> Self {
        let config = gateway.config();
        let cache = ResponseCache::new(config.cache_ttl(), config.cache_max_entries);
        Self { gateway, cache }
    }

    pub fn with_cache(gateway: Arc<RequestGateway>, cache: ResponseCache) -> Self {
        Self { gateway, cache }
    }

    pub fn gateway(&self) -> &Arc<RequestGateway> {
        &self.gateway
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    async fn cached<T>(&self, path: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let key = cache_key(path, None);
        self.cache
            .get_or_fetch(&key, None, || self.gateway.get::<T>(path))
            .await
    }

    // -----------------------------------------------------------------------
    // Auth
    // -----------------------------------------------------------------------

    /// Log in and persist the returned credentials.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str, remember_me: bool) -> Result<User> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
            remember_me,
        };
        let response: LoginResponse = self.gateway.post("/auth/login", &request).await?;

        let expiry_ms = token::expiry_of(&response.token).map(|exp| exp * 1000);
        self.gateway
            .credentials()
            .save(&response.token, &response.user, expiry_ms)
            .map_err(|e| QuizError::System {
                status: 0,
                message: format!("failed to save credentials: {e:#}"),
            })?;
        self.gateway.rearm_unauthorized();
        self.cache.clear(None);
        tracing::info!(user = %response.user.username, "logged in");
        Ok(response.user)
    }

    /// Tell the server, then drop local credentials whatever it answered.
    pub async fn logout(&self) -> Result<()> {
        let result = self
            .gateway
            .call::<serde_json::Value>(Method::POST, "/auth/logout", None, &CallOptions::quiet())
            .await;
        if let Err(e) = &result {
            tracing::debug!("server logout failed: {e}");
        }
        self.gateway.credentials().clear();
        self.cache.clear(None);
        result.map(|_| ())
    }

    pub async fn profile(&self) -> Result<User> {
        self.gateway.get("/auth/profile").await
    }

    // -----------------------------------------------------------------------
    // Banks and questions
    // -----------------------------------------------------------------------

    pub async fn banks(&self) -> Result<Vec<QuestionBank>> {
        self.cached("/banks").await
    }

    pub async fn bank(&self, id: u64) -> Result<QuestionBank> {
        self.cached(&format!("/banks/{id}")).await
    }

    pub async fn questions_by_bank(&self, bank_id: u64) -> Result<Vec<Question>> {
        self.cached(&format!("/questions/bank/{bank_id}")).await
    }

    pub async fn question(&self, id: QuestionId) -> Result<Question> {
        self.cached(&format!("/questions/{id}")).await
    }

    pub async fn questions_by_ids(&self, ids: &[QuestionId]) -> Result<Vec<Question>> {
        let options = CallOptions {
            timeout: Some(BATCH_FETCH_TIMEOUT),
            ..CallOptions::default()
        };
        self.gateway
            .call(Method::POST, "/questions/batch", Some(json!({ "ids": ids })), &options)
            .await
    }

    // -----------------------------------------------------------------------
    // Answers
    // -----------------------------------------------------------------------

    pub async fn submit_answer(&self, answer: &AnswerRequest) -> Result<AnswerResult> {
        let result = self.gateway.post("/answers", answer).await?;
        self.invalidate_answer_views();
        Ok(result)
    }

    pub async fn submit_answers(&self, answers: &[AnswerRequest]) -> Result<Vec<AnswerResult>> {
        let results = self.gateway.post("/answers/batch", answers).await?;
        self.invalidate_answer_views();
        Ok(results)
    }

    pub async fn answer_history(&self, page: Page) -> Result<PageResult<AnswerResult>> {
        self.gateway
            .get(&format!("/answers/history?{}", page.query()))
            .await
    }

    pub async fn answer_stats(&self) -> Result<AnswerStats> {
        self.cached("/answers/stats").await
    }

    fn invalidate_answer_views(&self) {
        self.cache.clear(Some("/answers"));
        self.cache.clear(Some("/wrong-questions"));
    }

    // -----------------------------------------------------------------------
    // Server-side sessions
    // -----------------------------------------------------------------------

    pub async fn start_session(&self, bank_id: u64, mode: AnswerMode) -> Result<StartSessionResult> {
        self.gateway
            .post("/sessions/start", &json!({ "bankId": bank_id, "mode": mode }))
            .await
    }

    pub async fn abandon_session(&self, session_id: &str) -> Result<()> {
        self.gateway
            .put::<serde_json::Value>(&format!("/sessions/{session_id}/abandon"))
            .await
            .map(|_| ())
    }

    pub async fn recent_sessions(&self, limit: u32) -> Result<Vec<ServerSession>> {
        self.gateway
            .get(&format!("/sessions/recent?limit={limit}"))
            .await
    }

    // -----------------------------------------------------------------------
    // Favorites
    // -----------------------------------------------------------------------

    pub async fn favorites(&self, page: Page) -> Result<PageResult<Favorite>> {
        self.cached(&format!("/favorites?{}", page.query())).await
    }

    pub async fn add_favorite(
        &self,
        question_id: QuestionId,
        bank_id: Option<u64>,
        notes: Option<&str>,
    ) -> Result<Favorite> {
        let body = NewFavorite {
            question_id,
            bank_id,
            notes,
        };
        let favorite = self.gateway.post("/favorites", &body).await?;
        self.cache.clear(Some("/favorites"));
        Ok(favorite)
    }

    pub async fn remove_favorite(&self, question_id: QuestionId) -> Result<()> {
        self.gateway
            .delete::<serde_json::Value>(&format!("/favorites/question/{question_id}"))
            .await?;
        self.cache.clear(Some("/favorites"));
        Ok(())
    }

    pub async fn is_favorite(&self, question_id: QuestionId) -> Result<bool> {
        self.gateway
            .get(&format!("/favorites/check/{question_id}"))
            .await
    }

    // -----------------------------------------------------------------------
    // Wrong questions
    // -----------------------------------------------------------------------

    pub async fn wrong_questions(&self, page: Page) -> Result<PageResult<WrongQuestion>> {
        self.cached(&format!("/wrong-questions?{}", page.query())).await
    }

    pub async fn mark_mastered(&self, question_id: QuestionId, mastered: bool) -> Result<()> {
        let action = if mastered { "mastered" } else { "unmastered" };
        self.gateway
            .put::<serde_json::Value>(&format!("/wrong-questions/{question_id}/{action}"))
            .await?;
        self.cache.clear(Some("/wrong-questions"));
        Ok(())
    }

    pub async fn wrong_question_stats(&self) -> Result<WrongQuestionStats> {
        self.cached("/wrong-questions/stats").await
    }
}

#[async_trait]
impl QuizApi for QuizClient {
    async fn questions_by_bank(&self, bank_id: u64) -> Result<Vec<Question>> {
        QuizClient::questions_by_bank(self, bank_id).await
    }

    async fn question(&self, id: QuestionId) -> Result<Question> {
        QuizClient::question(self, id).await
    }

    async fn questions_by_ids(&self, ids: &[QuestionId]) -> Result<Vec<Question>> {
        QuizClient::questions_by_ids(self, ids).await
    }

    async fn submit_answer(&self, answer: &AnswerRequest) -> Result<AnswerResult> {
        QuizClient::submit_answer(self, answer).await
    }

    async fn submit_answers(&self, answers: &[AnswerRequest]) -> Result<Vec<AnswerResult>> {
        QuizClient::submit_answers(self, answers).await
    }
}
