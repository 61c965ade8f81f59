//! Accuracy, progress and duration arithmetic.
//!
//! All functions are total: empty inputs produce zero, never NaN.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::AnswerResult;

/// Percentage of `correct` over `total`, rounded half away from zero.
/// A `total` of zero yields 0.
pub fn accuracy(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let pct = (correct.min(total) as f64 / total as f64) * 100.0;
    pct.round() as u32
}

/// Position of `current_index` within `total`, as a rounded percentage of
/// the 1-based question number.
pub fn progress(current_index: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    accuracy((current_index + 1).min(total), total)
}

/// Whole seconds between `start` and `end` (or `now` while still running),
/// clamped to zero if the clock went backwards.
pub fn duration_secs(start: DateTime<Utc>, end: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u64 {
    let end = end.unwrap_or(now);
    (end - start).num_seconds().max(0) as u64
}

/// Totals over a set of graded answers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizStats {
    pub total: usize,
    pub correct: usize,
    pub wrong: usize,
    pub accuracy: u32,
}

impl QuizStats {
    pub fn from_results(results: &[AnswerResult]) -> Self {
        let total = results.len();
        let correct = results.iter().filter(|r| r.is_correct).count();
        Self {
            total,
            correct,
            wrong: total - correct,
            accuracy: accuracy(correct, total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn result(id: u64, is_correct: bool) -> AnswerResult {
        AnswerResult {
            question_id: id,
            submitted_answer: "A".into(),
            is_correct,
            correct_answer: None,
            analysis: None,
            answered_at: None,
        }
    }

    #[test]
    fn accuracy_of_empty_set_is_zero() {
        assert_eq!(accuracy(0, 0), 0);
        assert_eq!(QuizStats::from_results(&[]), QuizStats::default());
    }

    #[test]
    fn accuracy_rounds() {
        assert_eq!(accuracy(1, 3), 33);
        assert_eq!(accuracy(2, 3), 67);
        assert_eq!(accuracy(1, 8), 13);
        assert_eq!(accuracy(5, 5), 100);
    }

    #[test]
    fn progress_uses_one_based_position() {
        assert_eq!(progress(0, 0), 0);
        assert_eq!(progress(0, 4), 25);
        assert_eq!(progress(3, 4), 100);
    }

    #[test]
    fn duration_never_negative() {
        let start = Utc::now();
        assert_eq!(duration_secs(start, Some(start + Duration::seconds(90)), start), 90);
        assert_eq!(duration_secs(start, None, start + Duration::seconds(5)), 5);
        assert_eq!(duration_secs(start, Some(start - Duration::seconds(5)), start), 0);
    }

    #[test]
    fn stats_from_results() {
        let stats = QuizStats::from_results(&[result(1, true), result(2, false), result(3, true)]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.correct, 2);
        assert_eq!(stats.wrong, 1);
        assert_eq!(stats.accuracy, 67);
    }
}
