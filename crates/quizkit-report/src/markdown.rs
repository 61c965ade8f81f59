//! Markdown rendering.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;

use quizkit_core::model::{Favorite, Question, WrongQuestion};
use quizkit_core::session::QuizSummary;
use quizkit_core::token::format_remaining;

/// Make text safe inside a table cell.
fn cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

fn question_text(question: Option<&Question>, id: u64) -> String {
    question
        .map(|q| cell(&q.content))
        .unwrap_or_else(|| format!("question #{id}"))
}

/// Review of one session: header, score line and a row per answer.
pub fn summary_markdown(summary: &QuizSummary) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# Quiz review\n");
    let _ = writeln!(
        md,
        "- Session: `{}`\n- Bank: {}\n- Mode: {}\n- Status: {}",
        summary.session_id, summary.bank_id, summary.mode, summary.status
    );
    let _ = writeln!(
        md,
        "- Score: {}/{} ({}% of answered)",
        summary.correct_count, summary.total_questions, summary.stats.accuracy
    );
    let _ = writeln!(md, "- Time: {}\n", duration(summary.duration_secs));

    if summary.answers.is_empty() {
        md.push_str("_No answers recorded._\n");
        return md;
    }

    md.push_str("| # | Question | Your answer | Correct answer | Result |\n");
    md.push_str("|---|---|---|---|---|\n");
    for (i, item) in summary.answers.iter().enumerate() {
        let _ = writeln!(
            md,
            "| {} | {} | {} | {} | {} |",
            i + 1,
            question_text(item.question.as_ref(), item.question_id),
            cell(&item.user_answer),
            cell(item.correct_answer.as_deref().unwrap_or("-")),
            if item.is_correct { "correct" } else { "wrong" }
        );
    }
    md
}

fn duration(secs: u64) -> String {
    if secs < 60 {
        format!("{secs}s")
    } else {
        format_remaining(secs as i64)
    }
}

pub fn mistakes_markdown(mistakes: &[WrongQuestion]) -> String {
    let mut md = String::from("# Mistakes\n\n");
    if mistakes.is_empty() {
        md.push_str("_Nothing to review._\n");
        return md;
    }
    md.push_str("| Question | Times wrong | Last answer | Mastered |\n");
    md.push_str("|---|---|---|---|\n");
    for m in mistakes {
        let _ = writeln!(
            md,
            "| {} | {} | {} | {} |",
            question_text(m.question.as_ref(), m.question_id),
            m.error_count,
            cell(m.last_error_answer.as_deref().unwrap_or("-")),
            if m.is_mastered() { "yes" } else { "no" }
        );
    }
    md
}

pub fn favorites_markdown(favorites: &[Favorite]) -> String {
    let mut md = String::from("# Favorites\n\n");
    if favorites.is_empty() {
        md.push_str("_No favorites yet._\n");
        return md;
    }
    for f in favorites {
        let _ = write!(md, "- {}", question_text(f.question.as_ref(), f.question_id));
        if let Some(notes) = f.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            let _ = write!(md, " ({})", notes.trim());
        }
        md.push('\n');
    }
    md
}

pub fn write_summary_markdown(summary: &QuizSummary, path: &Path) -> Result<()> {
    crate::write_file(path, &summary_markdown(summary))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use quizkit_core::model::{AnswerMode, QuestionType, SessionStatus};
    use quizkit_core::session::ReviewItem;
    use quizkit_core::statistics::QuizStats;

    pub(crate) fn sample_summary() -> QuizSummary {
        let question = Question {
            id: 1,
            bank_id: Some(2),
            kind: QuestionType::Single,
            content: "Which | keyword moves?".into(),
            options: vec![],
            correct_answer: Some("move".into()),
            analysis: None,
        };
        QuizSummary {
            session_id: "s-1".into(),
            bank_id: 2,
            mode: AnswerMode::Practice,
            status: SessionStatus::Completed,
            total_questions: 2,
            correct_count: 1,
            stats: QuizStats {
                total: 2,
                correct: 1,
                wrong: 1,
                accuracy: 50,
            },
            duration_secs: 125,
            answers: vec![
                ReviewItem {
                    question_id: 1,
                    user_answer: "move".into(),
                    is_correct: true,
                    correct_answer: Some("move".into()),
                    question: Some(question),
                },
                ReviewItem {
                    question_id: 9,
                    user_answer: "ref".into(),
                    is_correct: false,
                    correct_answer: None,
                    question: None,
                },
            ],
        }
    }

    #[test]
    fn summary_has_a_row_per_answer() {
        let md = summary_markdown(&sample_summary());
        assert!(md.contains("Score: 1/2 (50% of answered)"));
        assert!(md.contains("Time: 2m"));
        assert!(md.contains("Which \\| keyword moves?"));
        assert!(md.contains("| 2 | question #9 | ref | - | wrong |"));
    }

    #[test]
    fn empty_lists_have_placeholders() {
        assert!(mistakes_markdown(&[]).contains("Nothing to review"));
        assert!(favorites_markdown(&[]).contains("No favorites"));
    }

    #[test]
    fn mistakes_table() {
        let mistake = WrongQuestion {
            id: Some(1),
            question_id: 4,
            bank_id: None,
            error_count: 3,
            last_error_answer: Some("B".into()),
            status: 1,
            question: None,
        };
        let md = mistakes_markdown(&[mistake]);
        assert!(md.contains("| question #4 | 3 | B | yes |"));
    }

    #[test]
    fn write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("review.md");
        write_summary_markdown(&sample_summary(), &path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("# Quiz review"));
    }
}
