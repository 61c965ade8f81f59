//! In-memory doubles for testing the session engine without a server.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::error::{QuizError, Result};
use crate::model::{AnswerRequest, AnswerResult, Question, QuestionId, QuestionType};
use crate::traits::{KeyValueStore, QuizApi};

/// A single-choice question whose correct answer is `correct`.
pub fn question(id: QuestionId, correct: &str) -> Question {
    Question {
        id,
        bank_id: None,
        kind: QuestionType::Single,
        content: format!("Question {id}"),
        options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
        correct_answer: Some(correct.to_string()),
        analysis: None,
    }
}

/// Call counts per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockCalls {
    pub bank: u32,
    pub single_fetch: u32,
    pub batch_fetch: u32,
    pub submit: u32,
    pub submit_batch: u32,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// A mock quiz server.
///
/// Grades answers against each question's `correct_answer`, ignoring case
/// and surrounding whitespace. Failures can be queued, and all requests can
/// be held in flight with [`pause`](Self::pause) until [`resume`](Self::resume).
#[derive(Default)]
pub struct MockQuizApi {
    banks: HashMap<u64, Vec<Question>>,
    submit_failures: Mutex<VecDeque<QuizError>>,
    failing_questions: Mutex<HashSet<QuestionId>>,
    omitted: Mutex<HashSet<QuestionId>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    last_batch: Mutex<Option<Vec<AnswerRequest>>>,
    bank_calls: AtomicU32,
    single_calls: AtomicU32,
    batch_fetch_calls: AtomicU32,
    submit_calls: AtomicU32,
    batch_submit_calls: AtomicU32,
}

impl MockQuizApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bank(mut self, bank_id: u64, questions: Vec<Question>) -> Self {
        let questions = questions
            .into_iter()
            .map(|mut q| {
                q.bank_id = Some(bank_id);
                q
            })
            .collect();
        self.banks.insert(bank_id, questions);
        self
    }

    /// Fail the next single or batch submission with `err`.
    pub fn fail_next_submit(&self, err: QuizError) {
        lock(&self.submit_failures).push_back(err);
    }

    /// Make fetches of this question fail with a network error.
    pub fn fail_question(&self, id: QuestionId) {
        lock(&self.failing_questions).insert(id);
    }

    /// Leave this question out of batch submission responses.
    pub fn omit_from_batch(&self, id: QuestionId) {
        lock(&self.omitted).insert(id);
    }

    /// Hold every subsequent request until [`resume`](Self::resume).
    pub fn pause(&self) {
        *lock(&self.gate) = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn resume(&self) {
        if let Some(gate) = lock(&self.gate).take() {
            gate.add_permits(1024);
        }
    }

    pub fn calls(&self) -> MockCalls {
        MockCalls {
            bank: self.bank_calls.load(Ordering::Relaxed),
            single_fetch: self.single_calls.load(Ordering::Relaxed),
            batch_fetch: self.batch_fetch_calls.load(Ordering::Relaxed),
            submit: self.submit_calls.load(Ordering::Relaxed),
            submit_batch: self.batch_submit_calls.load(Ordering::Relaxed),
        }
    }

    /// The answers sent with the most recent batch submission.
    pub fn last_batch(&self) -> Option<Vec<AnswerRequest>> {
        lock(&self.last_batch).clone()
    }

    async fn wait_for_gate(&self) {
        let gate = lock(&self.gate).clone();
        if let Some(gate) = gate {
            // A closed semaphore also releases waiters.
            let _ = gate.acquire().await;
        }
    }

    fn find(&self, id: QuestionId) -> Option<&Question> {
        self.banks.values().flatten().find(|q| q.id == id)
    }

    fn fetch(&self, id: QuestionId) -> Result<Question> {
        if lock(&self.failing_questions).contains(&id) {
            return Err(QuizError::Network(format!("fetch of question {id} failed")));
        }
        self.find(id).cloned().ok_or_else(|| QuizError::Business {
            code: 404,
            message: format!("question {id} not found"),
        })
    }

    fn grade(&self, answer: &AnswerRequest) -> AnswerResult {
        let correct_answer = self.find(answer.question_id).and_then(|q| q.correct_answer.clone());
        let is_correct = correct_answer
            .as_deref()
            .is_some_and(|c| c.trim().eq_ignore_ascii_case(answer.user_answer.trim()));
        AnswerResult {
            question_id: answer.question_id,
            submitted_answer: answer.user_answer.clone(),
            is_correct,
            correct_answer,
            analysis: None,
            answered_at: None,
        }
    }
}

#[async_trait]
impl QuizApi for MockQuizApi {
    async fn questions_by_bank(&self, bank_id: u64) -> Result<Vec<Question>> {
        self.bank_calls.fetch_add(1, Ordering::Relaxed);
        self.wait_for_gate().await;
        self.banks
            .get(&bank_id)
            .cloned()
            .ok_or_else(|| QuizError::Business {
                code: 404,
                message: format!("bank {bank_id} not found"),
            })
    }

    async fn question(&self, id: QuestionId) -> Result<Question> {
        self.single_calls.fetch_add(1, Ordering::Relaxed);
        self.wait_for_gate().await;
        self.fetch(id)
    }

    async fn questions_by_ids(&self, ids: &[QuestionId]) -> Result<Vec<Question>> {
        self.batch_fetch_calls.fetch_add(1, Ordering::Relaxed);
        self.wait_for_gate().await;
        ids.iter().map(|&id| self.fetch(id)).collect()
    }

    async fn submit_answer(&self, answer: &AnswerRequest) -> Result<AnswerResult> {
        self.submit_calls.fetch_add(1, Ordering::Relaxed);
        self.wait_for_gate().await;
        if let Some(err) = lock(&self.submit_failures).pop_front() {
            return Err(err);
        }
        Ok(self.grade(answer))
    }

    async fn submit_answers(&self, answers: &[AnswerRequest]) -> Result<Vec<AnswerResult>> {
        self.batch_submit_calls.fetch_add(1, Ordering::Relaxed);
        *lock(&self.last_batch) = Some(answers.to_vec());
        self.wait_for_gate().await;
        if let Some(err) = lock(&self.submit_failures).pop_front() {
            return Err(err);
        }
        let omitted = lock(&self.omitted).clone();
        Ok(answers
            .iter()
            .filter(|a| !omitted.contains(&a.question_id))
            .map(|a| self.grade(a))
            .collect())
    }
}

/// A [`KeyValueStore`] held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}
