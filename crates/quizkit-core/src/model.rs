//! Core data model types for quizkit.
//!
//! Wire types mirror the server's camelCase JSON. Session-local types
//! (`SessionStatus`, `StagedAnswer`) never leave the client.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Server-assigned question identifier.
pub type QuestionId = u64;

/// Whether a session grades each answer immediately or all at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    /// One answer at a time, graded on submit.
    Practice,
    /// All answers submitted together at the end.
    Exam,
}

impl fmt::Display for AnswerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerMode::Practice => write!(f, "practice"),
            AnswerMode::Exam => write!(f, "exam"),
        }
    }
}

impl FromStr for AnswerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "practice" => Ok(AnswerMode::Practice),
            "exam" => Ok(AnswerMode::Exam),
            other => Err(format!("unknown answer mode: '{other}'")),
        }
    }
}

/// Lifecycle of a session. `Completed` and `Abandoned` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    Ongoing,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Abandoned)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::Ongoing => "ongoing",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

/// Question kinds offered by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Single,
    Multiple,
    Judge,
    Essay,
}

/// A single question from a bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    #[serde(default)]
    pub bank_id: Option<u64>,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub content: String,
    #[serde(default)]
    pub options: Vec<String>,
    /// Absent while an exam is in progress.
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub analysis: Option<String>,
}

/// A question bank as listed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionBank {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub question_count: Option<u32>,
}

/// One answer sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub question_id: QuestionId,
    pub user_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl AnswerRequest {
    pub fn new(question_id: QuestionId, user_answer: impl Into<String>) -> Self {
        Self {
            question_id,
            user_answer: user_answer.into(),
            question_index: None,
            session_id: None,
        }
    }

    /// True when the answer is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.user_answer.trim().is_empty()
    }
}

/// A server-confirmed grading of one answer. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    pub question_id: QuestionId,
    #[serde(rename = "userAnswer", default)]
    pub submitted_answer: String,
    #[serde(default, deserialize_with = "bool_or_flag")]
    pub is_correct: bool,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub analysis: Option<String>,
    /// Server timestamp of the grading.
    #[serde(rename = "createdAt", default)]
    pub answered_at: Option<DateTime<Utc>>,
}

/// The server stores correctness as `0`/`1`; older endpoints send booleans.
fn bool_or_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Null(()),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
        Flag::Null(()) => false,
    })
}

/// A locally held answer for a question in an ongoing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedAnswer {
    pub answer: String,
    /// Set once the server has graded this exact answer.
    #[serde(default)]
    pub confirmed: bool,
}

/// Server-side view of a session, returned by the `/sessions` endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSession {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub bank_id: Option<u64>,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub mode: Option<AnswerMode>,
    #[serde(default)]
    pub total_questions: Option<u32>,
    #[serde(default)]
    pub current_index: Option<u32>,
    #[serde(default)]
    pub correct_count: Option<u32>,
    #[serde(default)]
    pub status: Option<SessionStatus>,
}

/// Response of `POST /sessions/start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResult {
    pub session: ServerSession,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub answers: Vec<AnswerResult>,
    #[serde(default)]
    pub start_index: usize,
}

/// A favorited question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    #[serde(default)]
    pub id: Option<u64>,
    pub question_id: QuestionId,
    #[serde(default)]
    pub bank_id: Option<u64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub question: Option<Question>,
}

/// A question the user has answered wrongly at least once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrongQuestion {
    #[serde(default)]
    pub id: Option<u64>,
    pub question_id: QuestionId,
    #[serde(default)]
    pub bank_id: Option<u64>,
    #[serde(default)]
    pub error_count: u32,
    #[serde(default)]
    pub last_error_answer: Option<String>,
    /// `1` once the user marked it as mastered.
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub question: Option<Question>,
}

impl WrongQuestion {
    pub fn is_mastered(&self) -> bool {
        self.status == 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrongQuestionStats {
    #[serde(default)]
    pub total_wrong_questions: u32,
    #[serde(default)]
    pub mastered_questions: u32,
    #[serde(default)]
    pub unmastered_questions: u32,
}

/// Lifetime answer statistics from `GET /answers/stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerStats {
    #[serde(default)]
    pub total_answers: u64,
    #[serde(default)]
    pub correct_answers: u64,
    #[serde(default)]
    pub accuracy: f64,
}

/// The logged-in user's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: Option<u64>,
    pub username: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// A page of records from a paginated endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult<T> {
    pub records: Vec<T>,
    #[serde(default)]
    pub current: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub pages: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_mode_parse_and_display() {
        assert_eq!("Exam".parse::<AnswerMode>().unwrap(), AnswerMode::Exam);
        assert_eq!(AnswerMode::Practice.to_string(), "practice");
        assert!("quiz".parse::<AnswerMode>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Abandoned.is_terminal());
        assert!(!SessionStatus::Ongoing.is_terminal());
        assert!(!SessionStatus::NotStarted.is_terminal());
    }

    #[test]
    fn answer_result_accepts_integer_flag() {
        let json = r#"{"questionId": 7, "userAnswer": "B", "isCorrect": 1}"#;
        let result: AnswerResult = serde_json::from_str(json).unwrap();
        assert!(result.is_correct);
        assert_eq!(result.submitted_answer, "B");

        let json = r#"{"questionId": 7, "userAnswer": "C", "isCorrect": false}"#;
        let result: AnswerResult = serde_json::from_str(json).unwrap();
        assert!(!result.is_correct);

        let json = r#"{"questionId": 7, "isCorrect": null}"#;
        let result: AnswerResult = serde_json::from_str(json).unwrap();
        assert!(!result.is_correct);
    }

    #[test]
    fn answer_request_omits_unset_fields() {
        let json = serde_json::to_value(AnswerRequest::new(3, "A")).unwrap();
        assert_eq!(json, serde_json::json!({"questionId": 3, "userAnswer": "A"}));
        assert!(AnswerRequest::new(3, "  \t").is_blank());
    }

    #[test]
    fn question_uses_type_field() {
        let json = r#"{"id": 1, "type": "single", "content": "2+2?", "options": ["3", "4"]}"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.kind, QuestionType::Single);
        assert_eq!(q.options.len(), 2);
        assert!(q.correct_answer.is_none());
    }
}
