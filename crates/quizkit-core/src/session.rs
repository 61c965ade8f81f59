//! The quiz-session state machine.
//!
//! A `SessionEngine` owns at most one session at a time. Mutations are
//! applied under a short-lived lock that is never held across a network
//! call: each async operation snapshots what it needs, releases the lock,
//! awaits the `QuizApi`, and then re-locks to apply the response only if the
//! session it started for is still the active, ongoing one. Responses for a
//! session that was reset, abandoned or replaced are dropped with
//! [`QuizError::StaleSession`].
//!
//! The staged-answer map, question list and result list are held behind
//! `Arc`s and replaced copy-on-write, so a reader holding an older snapshot
//! never observes a half-applied update.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{QuizError, Result};
use crate::model::{
    AnswerMode, AnswerRequest, AnswerResult, Question, QuestionId, SessionStatus, StagedAnswer,
};
use crate::statistics::{self, QuizStats};
use crate::traits::{KeyValueStore, QuizApi};

/// Storage key for persisted in-progress sessions.
pub const CURRENT_SESSION_KEY: &str = "currentSession";

/// Up to this many question ids are fetched one by one in parallel; larger
/// sets go through the batch endpoint.
pub const FAN_OUT_LIMIT: usize = 50;

const SNAPSHOT_VERSION: u32 = 1;

/// One user's attempt at a set of questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub bank_id: u64,
    pub mode: AnswerMode,
    pub current_index: usize,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub correct_count: usize,
}

/// Aggregate returned by a batch submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub correct_count: usize,
    /// Number of items the server confirmed.
    pub total: usize,
    pub accuracy: u32,
    pub results: Vec<AnswerResult>,
    /// Sent but missing from the response. These stay staged.
    pub unconfirmed: Vec<QuestionId>,
}

/// One line of a finished session's review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    pub question_id: QuestionId,
    pub user_answer: String,
    pub is_correct: bool,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub question: Option<Question>,
}

/// Result view of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    pub session_id: String,
    pub bank_id: u64,
    pub mode: AnswerMode,
    pub status: SessionStatus,
    pub total_questions: usize,
    pub correct_count: usize,
    pub stats: QuizStats,
    pub duration_secs: u64,
    pub answers: Vec<ReviewItem>,
}

/// Serialized form of an ongoing session, used to survive restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub version: u32,
    pub session: Session,
    pub questions: Vec<Question>,
    pub staged: HashMap<QuestionId, StagedAnswer>,
    pub results: Vec<AnswerResult>,
}

impl SessionSnapshot {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.version != SNAPSHOT_VERSION {
            return Err(format!("unsupported snapshot version {}", self.version));
        }
        if self.session.status != SessionStatus::Ongoing {
            return Err(format!("session is {}", self.session.status));
        }
        let total = self.questions.len();
        if total > 0 && self.session.current_index >= total {
            return Err(format!(
                "current index {} out of range for {total} questions",
                self.session.current_index
            ));
        }
        if total == 0 && self.session.current_index != 0 {
            return Err("current index set without questions".to_string());
        }
        if self.staged.values().any(|s| s.answer.trim().is_empty()) {
            return Err("blank staged answer".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct EngineState {
    session: Option<Session>,
    questions: Arc<Vec<Question>>,
    staged: Arc<HashMap<QuestionId, StagedAnswer>>,
    results: Arc<Vec<AnswerResult>>,
}

impl EngineState {
    fn status(&self) -> SessionStatus {
        self.session
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(SessionStatus::NotStarted)
    }

    /// The ongoing session, or `InvalidState` naming `action`.
    fn ongoing(&self, action: &'static str) -> Result<&Session> {
        match &self.session {
            Some(s) if s.status == SessionStatus::Ongoing => Ok(s),
            _ => Err(QuizError::invalid_state(self.status(), action)),
        }
    }

    fn ongoing_mut(&mut self, action: &'static str) -> Result<&mut Session> {
        let status = self.status();
        match &mut self.session {
            Some(s) if s.status == SessionStatus::Ongoing => Ok(s),
            _ => Err(QuizError::invalid_state(status, action)),
        }
    }

    /// Whether `session_id` is still the active ongoing session.
    fn is_active(&self, session_id: &str) -> bool {
        matches!(&self.session, Some(s) if s.id == session_id && s.status == SessionStatus::Ongoing)
    }

    fn index_of(&self, question_id: QuestionId) -> Option<usize> {
        self.questions.iter().position(|q| q.id == question_id)
    }
}

/// The quiz-session state machine.
pub struct SessionEngine {
    api: Arc<dyn QuizApi>,
    clock: Arc<dyn Clock>,
    store: Option<Arc<dyn KeyValueStore>>,
    state: Mutex<EngineState>,
}

impl SessionEngine {
    pub fn new(api: Arc<dyn QuizApi>) -> Self {
        Self {
            api,
            clock: Arc::new(SystemClock),
            store: None,
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Clear the persisted session from `store` whenever the session ends
    /// or is reset.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn clear_persisted(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.remove(CURRENT_SESSION_KEY) {
                tracing::debug!("failed to clear persisted session: {e:#}");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn stale(session_id: String) -> QuizError {
        tracing::debug!(%session_id, "dropping response for inactive session");
        QuizError::StaleSession { session_id }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Begin a new session with no questions loaded yet.
    pub fn start(&self, bank_id: u64, mode: AnswerMode) -> Result<String> {
        self.start_with(bank_id, mode, Vec::new())
    }

    /// Begin a new session over an already fetched question list.
    pub fn start_with(
        &self,
        bank_id: u64,
        mode: AnswerMode,
        questions: Vec<Question>,
    ) -> Result<String> {
        let mut state = self.lock();
        if state.session.is_some() {
            return Err(QuizError::invalid_state(state.status(), "start a session"));
        }

        let id = Uuid::new_v4().to_string();
        state.session = Some(Session {
            id: id.clone(),
            bank_id,
            mode,
            current_index: 0,
            status: SessionStatus::Ongoing,
            start_time: self.clock.now(),
            end_time: None,
            correct_count: 0,
        });
        state.questions = Arc::new(questions);
        state.staged = Arc::new(HashMap::new());
        state.results = Arc::new(Vec::new());

        tracing::info!(session_id = %id, bank_id, %mode, "session started");
        Ok(id)
    }

    /// Complete the session and score it from the recorded results.
    pub fn finalize(&self) -> Result<QuizSummary> {
        let now = self.clock.now();
        let mut state = self.lock();
        let correct = state.results.iter().filter(|r| r.is_correct).count();
        let session = state.ongoing_mut("finalize")?;
        session.status = SessionStatus::Completed;
        session.end_time = Some(now);
        session.correct_count = correct;
        tracing::info!(session_id = %session.id, correct, "session completed");

        let summary = Self::summarize(&state, now)
            .ok_or_else(|| QuizError::invalid_state(SessionStatus::NotStarted, "finalize"));
        drop(state);
        self.clear_persisted();
        summary
    }

    /// End the session without scoring it.
    pub fn abandon(&self) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.lock();
        let session = state.ongoing_mut("abandon")?;
        session.status = SessionStatus::Abandoned;
        session.end_time = Some(now);
        tracing::info!(session_id = %session.id, "session abandoned");
        drop(state);
        self.clear_persisted();
        Ok(())
    }

    /// Discard all in-memory state. Valid from any state.
    pub fn reset(&self) {
        let mut state = self.lock();
        if let Some(session) = &state.session {
            tracing::debug!(session_id = %session.id, "session reset");
        }
        *state = EngineState::default();
        drop(state);
        self.clear_persisted();
    }

    // -----------------------------------------------------------------------
    // Question hydration
    // -----------------------------------------------------------------------

    /// Fetch the active session's bank and install its questions.
    pub async fn load_bank(&self) -> Result<usize> {
        let (session_id, bank_id) = {
            let state = self.lock();
            let session = state.ongoing("load questions")?;
            (session.id.clone(), session.bank_id)
        };

        let questions = self.api.questions_by_bank(bank_id).await?;
        self.install_questions(session_id, questions)
    }

    /// Fetch the given questions and install them in order.
    ///
    /// Small sets fan out one request per question and fail as a whole if
    /// any request fails.
    pub async fn load_questions(&self, ids: &[QuestionId]) -> Result<usize> {
        let session_id = self.lock().ongoing("load questions")?.id.clone();

        let questions = if ids.len() > FAN_OUT_LIMIT {
            self.api.questions_by_ids(ids).await?
        } else {
            try_join_all(ids.iter().map(|&id| self.api.question(id))).await?
        };
        self.install_questions(session_id, questions)
    }

    fn install_questions(&self, session_id: String, questions: Vec<Question>) -> Result<usize> {
        let mut state = self.lock();
        if !state.is_active(&session_id) {
            return Err(Self::stale(session_id));
        }
        let count = questions.len();
        state.questions = Arc::new(questions);
        state.staged = Arc::new(HashMap::new());
        state.results = Arc::new(Vec::new());
        if let Some(session) = state.session.as_mut() {
            session.current_index = 0;
        }
        tracing::debug!(%session_id, count, "questions loaded");
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    /// Move to `index`. Out-of-range indexes and inactive sessions are ignored.
    pub fn navigate(&self, index: usize) -> bool {
        let mut state = self.lock();
        let total = state.questions.len();
        match state.ongoing_mut("navigate") {
            Ok(session) if index < total => {
                session.current_index = index;
                true
            }
            _ => false,
        }
    }

    pub fn next(&self) -> bool {
        let index = self.current_index();
        self.navigate(index + 1)
    }

    pub fn prev(&self) -> bool {
        match self.current_index().checked_sub(1) {
            Some(index) => self.navigate(index),
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Answers
    // -----------------------------------------------------------------------

    /// Hold an answer locally, replacing any earlier one for the question.
    pub fn stage_answer(&self, question_id: QuestionId, answer: &str) -> Result<()> {
        let mut state = self.lock();
        state.ongoing("stage an answer")?;
        if answer.trim().is_empty() {
            return Err(QuizError::validation("answer must not be empty"));
        }
        Arc::make_mut(&mut state.staged).insert(
            question_id,
            StagedAnswer {
                answer: answer.to_string(),
                confirmed: false,
            },
        );
        Ok(())
    }

    /// Stage and submit one answer for immediate grading (practice mode).
    ///
    /// On failure the staged answer is left as it was so the call can be
    /// retried.
    pub async fn submit_single(&self, question_id: QuestionId, answer: &str) -> Result<AnswerResult> {
        let request = {
            let mut state = self.lock();
            let session = state.ongoing("submit an answer")?;
            if session.mode != AnswerMode::Practice {
                return Err(QuizError::invalid_state(
                    session.status,
                    "submit a single answer in exam mode",
                ));
            }
            if answer.trim().is_empty() {
                return Err(QuizError::validation("answer must not be empty"));
            }
            let session_id = session.id.clone();
            let question_index = state.index_of(question_id);
            Arc::make_mut(&mut state.staged).insert(
                question_id,
                StagedAnswer {
                    answer: answer.to_string(),
                    confirmed: false,
                },
            );
            AnswerRequest {
                question_id,
                user_answer: answer.to_string(),
                question_index,
                session_id: Some(session_id),
            }
        };
        let session_id = request.session_id.clone().unwrap_or_default();

        let result = match self.api.submit_answer(&request).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(%session_id, question_id, "answer submission failed: {e}");
                return Err(e);
            }
        };

        let mut state = self.lock();
        if !state.is_active(&session_id) {
            return Err(Self::stale(session_id));
        }
        Self::confirm(&mut state, std::slice::from_ref(&request));
        Self::record_results(&mut state, std::slice::from_ref(&result));
        Ok(result)
    }

    /// Submit a set of answers for grading (exam mode).
    ///
    /// Blank answers are dropped before sending. The response is applied in a
    /// single swap; items the server did not confirm are reported in
    /// [`BatchOutcome::unconfirmed`] and stay staged.
    pub async fn submit_batch(&self, answers: Vec<AnswerRequest>) -> Result<BatchOutcome> {
        let (session_id, sent) = {
            let mut state = self.lock();
            let session = state.ongoing("submit answers")?;
            if session.mode != AnswerMode::Exam {
                return Err(QuizError::invalid_state(
                    session.status,
                    "submit a batch in practice mode",
                ));
            }
            let session_id = session.id.clone();

            let sent: Vec<AnswerRequest> = answers
                .into_iter()
                .filter(|a| !a.is_blank())
                .map(|mut a| {
                    a.question_index = a.question_index.or_else(|| state.index_of(a.question_id));
                    a.session_id = Some(session_id.clone());
                    a
                })
                .collect();

            let staged = Arc::make_mut(&mut state.staged);
            for a in &sent {
                staged.insert(
                    a.question_id,
                    StagedAnswer {
                        answer: a.user_answer.clone(),
                        confirmed: false,
                    },
                );
            }
            (session_id, sent)
        };

        if sent.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let response = match self.api.submit_answers(&sent).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(%session_id, count = sent.len(), "batch submission failed: {e}");
                return Err(e);
            }
        };

        let sent_ids: HashSet<QuestionId> = sent.iter().map(|a| a.question_id).collect();
        let (accepted, foreign): (Vec<_>, Vec<_>) = response
            .into_iter()
            .partition(|r| sent_ids.contains(&r.question_id));
        if !foreign.is_empty() {
            tracing::warn!(
                %session_id,
                count = foreign.len(),
                "ignoring results for questions that were not sent"
            );
        }
        let confirmed_ids: HashSet<QuestionId> = accepted.iter().map(|r| r.question_id).collect();
        let unconfirmed: Vec<QuestionId> = sent
            .iter()
            .map(|a| a.question_id)
            .filter(|id| !confirmed_ids.contains(id))
            .collect();

        let mut state = self.lock();
        if !state.is_active(&session_id) {
            return Err(Self::stale(session_id));
        }
        let confirmed: Vec<AnswerRequest> = sent
            .into_iter()
            .filter(|a| confirmed_ids.contains(&a.question_id))
            .collect();
        Self::confirm(&mut state, &confirmed);
        Self::record_results(&mut state, &accepted);
        drop(state);

        let correct_count = accepted.iter().filter(|r| r.is_correct).count();
        let total = accepted.len();
        if !unconfirmed.is_empty() {
            tracing::warn!(%session_id, missing = unconfirmed.len(), "batch partially confirmed");
        }
        Ok(BatchOutcome {
            correct_count,
            total,
            accuracy: statistics::accuracy(correct_count, total),
            results: accepted,
            unconfirmed,
        })
    }

    /// Submit every staged, unconfirmed answer as one batch, in question order.
    pub async fn submit_staged(&self) -> Result<BatchOutcome> {
        let answers = {
            let state = self.lock();
            let mut pending: Vec<(usize, AnswerRequest)> = state
                .staged
                .iter()
                .filter(|(_, s)| !s.confirmed)
                .map(|(&id, s)| {
                    let index = state.index_of(id);
                    let mut request = AnswerRequest::new(id, s.answer.clone());
                    request.question_index = index;
                    (index.unwrap_or(usize::MAX), request)
                })
                .collect();
            pending.sort_by_key(|(index, r)| (*index, r.question_id));
            pending.into_iter().map(|(_, r)| r).collect()
        };
        self.submit_batch(answers).await
    }

    /// Mark staged answers as confirmed when they still match what was sent.
    /// Keep one result per question; a newer grading replaces the older one.
    fn record_results(state: &mut EngineState, graded: &[AnswerResult]) {
        let results = Arc::make_mut(&mut state.results);
        for r in graded {
            match results.iter_mut().find(|old| old.question_id == r.question_id) {
                Some(old) => *old = r.clone(),
                None => results.push(r.clone()),
            }
        }
    }

    fn confirm(state: &mut EngineState, sent: &[AnswerRequest]) {
        let staged = Arc::make_mut(&mut state.staged);
        for a in sent {
            if let Some(s) = staged.get_mut(&a.question_id) {
                if s.answer == a.user_answer {
                    s.confirmed = true;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Getters
    // -----------------------------------------------------------------------

    pub fn status(&self) -> SessionStatus {
        self.lock().status()
    }

    pub fn session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.lock().session.as_ref().map(|s| s.id.clone())
    }

    pub fn questions(&self) -> Arc<Vec<Question>> {
        Arc::clone(&self.lock().questions)
    }

    pub fn total_questions(&self) -> usize {
        self.lock().questions.len()
    }

    pub fn current_index(&self) -> usize {
        self.lock()
            .session
            .as_ref()
            .map(|s| s.current_index)
            .unwrap_or(0)
    }

    pub fn current_question(&self) -> Option<Question> {
        let state = self.lock();
        let index = state.session.as_ref()?.current_index;
        state.questions.get(index).cloned()
    }

    pub fn has_next(&self) -> bool {
        let state = self.lock();
        let index = state.session.as_ref().map(|s| s.current_index).unwrap_or(0);
        index + 1 < state.questions.len()
    }

    pub fn has_prev(&self) -> bool {
        self.current_index() > 0
    }

    /// Rounded percentage position through the question list.
    pub fn progress(&self) -> u32 {
        let state = self.lock();
        let index = state.session.as_ref().map(|s| s.current_index).unwrap_or(0);
        statistics::progress(index, state.questions.len())
    }

    pub fn staged_answer(&self, question_id: QuestionId) -> Option<StagedAnswer> {
        self.lock().staged.get(&question_id).cloned()
    }

    pub fn staged_answers(&self) -> Arc<HashMap<QuestionId, StagedAnswer>> {
        Arc::clone(&self.lock().staged)
    }

    pub fn results(&self) -> Arc<Vec<AnswerResult>> {
        Arc::clone(&self.lock().results)
    }

    pub fn stats(&self) -> QuizStats {
        QuizStats::from_results(&self.lock().results)
    }

    /// Seconds since start, up to `end_time` once the session has ended.
    pub fn duration_secs(&self) -> u64 {
        let now = self.clock.now();
        self.lock()
            .session
            .as_ref()
            .map(|s| statistics::duration_secs(s.start_time, s.end_time, now))
            .unwrap_or(0)
    }

    /// Review of the current session in any state but `NotStarted`.
    pub fn summary(&self) -> Option<QuizSummary> {
        let now = self.clock.now();
        Self::summarize(&self.lock(), now)
    }

    fn summarize(state: &EngineState, now: DateTime<Utc>) -> Option<QuizSummary> {
        let session = state.session.as_ref()?;
        let find = |id: QuestionId| state.questions.iter().find(|q| q.id == id).cloned();

        let answers = if state.results.is_empty() {
            state
                .questions
                .iter()
                .map(|q| ReviewItem {
                    question_id: q.id,
                    user_answer: state
                        .staged
                        .get(&q.id)
                        .map(|s| s.answer.clone())
                        .unwrap_or_default(),
                    is_correct: false,
                    correct_answer: q.correct_answer.clone(),
                    question: Some(q.clone()),
                })
                .collect()
        } else {
            state
                .results
                .iter()
                .map(|r| {
                    let question = find(r.question_id);
                    ReviewItem {
                        question_id: r.question_id,
                        user_answer: r.submitted_answer.clone(),
                        is_correct: r.is_correct,
                        correct_answer: r
                            .correct_answer
                            .clone()
                            .or_else(|| question.as_ref().and_then(|q| q.correct_answer.clone())),
                        question,
                    }
                })
                .collect()
        };

        Some(QuizSummary {
            session_id: session.id.clone(),
            bank_id: session.bank_id,
            mode: session.mode,
            status: session.status,
            total_questions: state.questions.len(),
            correct_count: session.correct_count,
            stats: QuizStats::from_results(&state.results),
            duration_secs: statistics::duration_secs(session.start_time, session.end_time, now),
            answers,
        })
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Serializable copy of an ongoing session.
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        let state = self.lock();
        let session = state.ongoing("snapshot").ok()?.clone();
        Some(SessionSnapshot {
            version: SNAPSHOT_VERSION,
            session,
            questions: state.questions.as_ref().clone(),
            staged: state.staged.as_ref().clone(),
            results: state.results.as_ref().clone(),
        })
    }

    /// Write the ongoing session to `store`, or clear the key if there is none.
    pub fn persist(&self, store: &dyn KeyValueStore) -> anyhow::Result<()> {
        match self.snapshot() {
            Some(snapshot) => store.set(CURRENT_SESSION_KEY, &serde_json::to_string(&snapshot)?),
            None => store.remove(CURRENT_SESSION_KEY),
        }
    }

    /// Resume a persisted session. Missing, corrupt or finished snapshots are
    /// treated as no prior state and removed. Returns whether a session was
    /// resumed.
    pub fn restore(&self, store: &dyn KeyValueStore) -> bool {
        let Some(raw) = store.get(CURRENT_SESSION_KEY) else {
            return false;
        };

        let snapshot = serde_json::from_str::<SessionSnapshot>(&raw)
            .map_err(|e| e.to_string())
            .and_then(|s| s.validate().map(|_| s));
        let snapshot = match snapshot {
            Ok(s) => s,
            Err(reason) => {
                tracing::warn!("discarding persisted session: {reason}");
                if let Err(e) = store.remove(CURRENT_SESSION_KEY) {
                    tracing::debug!("failed to remove persisted session: {e:#}");
                }
                return false;
            }
        };

        let mut state = self.lock();
        if state.session.is_some() {
            tracing::debug!("session already active, not restoring");
            return false;
        }
        tracing::info!(session_id = %snapshot.session.id, "session restored");
        *state = EngineState {
            session: Some(snapshot.session),
            questions: Arc::new(snapshot.questions),
            staged: Arc::new(snapshot.staged),
            results: Arc::new(snapshot.results),
        };
        true
    }
}
