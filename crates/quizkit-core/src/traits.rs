//! Trait definitions for the collaborators the core depends on.
//!
//! `QuizApi` is implemented over HTTP by `quizkit-client` and in memory by
//! [`crate::mock::MockQuizApi`]. Storage, error reporting and notification
//! are supplied by the host.

use async_trait::async_trait;

use crate::classify::ErrorInfo;
use crate::error::Result;
use crate::model::{AnswerRequest, AnswerResult, Question, QuestionId};

// ---------------------------------------------------------------------------
// Quiz API
// ---------------------------------------------------------------------------

/// The network operations the session engine needs.
#[async_trait]
pub trait QuizApi: Send + Sync {
    /// All questions of a bank, in bank order.
    async fn questions_by_bank(&self, bank_id: u64) -> Result<Vec<Question>>;

    /// A single question.
    async fn question(&self, id: QuestionId) -> Result<Question>;

    /// Many questions in one request.
    async fn questions_by_ids(&self, ids: &[QuestionId]) -> Result<Vec<Question>>;

    /// Grade one answer.
    async fn submit_answer(&self, answer: &AnswerRequest) -> Result<AnswerResult>;

    /// Grade many answers. The response holds one result per confirmed item.
    async fn submit_answers(&self, answers: &[AnswerRequest]) -> Result<Vec<AnswerResult>>;
}

// ---------------------------------------------------------------------------
// Host collaborators
// ---------------------------------------------------------------------------

/// Persistent string key-value storage provided by the host environment.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;

    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// Remote endpoint that receives severe error records.
#[async_trait]
pub trait ErrorSink: Send + Sync {
    async fn report(&self, info: &ErrorInfo) -> anyhow::Result<()>;
}

/// Shows an error to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, info: &ErrorInfo);
}

/// Notifier that shows nothing.
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, _: &ErrorInfo) {}
}
