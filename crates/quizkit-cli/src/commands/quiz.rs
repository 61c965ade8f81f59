//! The `quizkit practice` and `quizkit exam` commands.
//!
//! Questions are read from stdin one answer per line. An empty line skips
//! the question, `:q` (or end of input) saves the session for `--resume`.

use std::path::PathBuf;

use anyhow::{bail, Result};
use comfy_table::Table;
use tokio::io::{AsyncBufReadExt, BufReader};

use quizkit_core::model::{AnswerMode, Question, QuestionType};
use quizkit_core::session::QuizSummary;
use quizkit_core::SessionEngine;
use quizkit_report::{json, markdown};

use super::ReportFormat;

const QUIT: &str = ":q";

pub async fn execute(
    bank_id: u64,
    mode: AnswerMode,
    resume: bool,
    report: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    // Fail on a bad report path before any questions are answered.
    let format = report.as_deref().map(ReportFormat::for_path).transpose()?;

    let ctx = super::context(config_path)?;
    let store = ctx.store().clone();
    let engine = ctx.engine();

    if resume && !resume_session(&engine, store.as_ref(), bank_id, mode) {
        println!("No saved {mode} session for bank {bank_id}, starting a new one.");
    }
    if engine.session().is_none() {
        engine.start(bank_id, mode)?;
        let loaded = engine.load_bank().await?;
        if loaded == 0 {
            engine.reset();
            bail!("bank {bank_id} has no questions");
        }
        println!("Loaded {loaded} questions from bank {bank_id}.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(question) = engine.current_question() else {
            break;
        };
        print_question(&engine, &question);

        let input = match lines.next_line().await? {
            Some(line) if line.trim() != QUIT => line,
            _ => {
                engine.persist(store.as_ref())?;
                println!("\nSession saved. Continue with --resume.");
                return Ok(());
            }
        };
        let answer = input.trim();

        if !answer.is_empty() {
            match mode {
                AnswerMode::Practice => match engine.submit_single(question.id, answer).await {
                    Ok(result) if result.is_correct => println!("Correct!"),
                    Ok(result) => {
                        let expected = result
                            .correct_answer
                            .or(question.correct_answer.clone())
                            .unwrap_or_else(|| "?".into());
                        println!("Wrong. Correct answer: {expected}");
                        if let Some(analysis) = result.analysis {
                            println!("  {analysis}");
                        }
                    }
                    Err(e) if e.is_retryable() => {
                        // The staged answer is kept; ask the same question again.
                        tracing::debug!("submit failed: {e}");
                        engine.persist(store.as_ref())?;
                        continue;
                    }
                    Err(e) => {
                        engine.persist(store.as_ref())?;
                        let hint = if e.is_unauthorized() {
                            "session expired, log in again and continue with --resume"
                        } else {
                            "failed to submit answer (saved, retry with --resume)"
                        };
                        return Err(anyhow::Error::new(e).context(hint));
                    }
                },
                AnswerMode::Exam => engine.stage_answer(question.id, answer)?,
            }
            engine.persist(store.as_ref())?;
        }

        if !engine.next() {
            break;
        }
    }

    if mode == AnswerMode::Exam {
        let outcome = match engine.submit_staged().await {
            Ok(outcome) => outcome,
            Err(e) => {
                engine.persist(store.as_ref())?;
                return Err(anyhow::Error::new(e)
                    .context("failed to submit exam answers (saved, retry with --resume)"));
            }
        };
        if !outcome.unconfirmed.is_empty() {
            eprintln!(
                "warning: {} answer(s) were not confirmed by the server",
                outcome.unconfirmed.len()
            );
        }
    }

    let summary = engine.finalize()?;
    print_summary(&summary);

    if let (Some(path), Some(format)) = (report, format) {
        let content = match format {
            ReportFormat::Markdown => markdown::summary_markdown(&summary),
            ReportFormat::Json => json::summary_json(&summary)?,
        };
        super::write_report(&path, &content)?;
    }
    Ok(())
}

/// Restore a saved session if it belongs to `bank_id` and `mode`.
fn resume_session(
    engine: &SessionEngine,
    store: &dyn quizkit_core::traits::KeyValueStore,
    bank_id: u64,
    mode: AnswerMode,
) -> bool {
    if !engine.restore(store) {
        return false;
    }
    match engine.session() {
        Some(s) if s.bank_id == bank_id && s.mode == mode => {
            println!(
                "Resuming at question {} of {}.",
                s.current_index + 1,
                engine.total_questions()
            );
            true
        }
        _ => {
            engine.reset();
            false
        }
    }
}

fn option_label(i: usize) -> char {
    (b'A' + (i % 26) as u8) as char
}

fn print_question(engine: &SessionEngine, question: &Question) {
    println!(
        "\n[{}/{}] {}",
        engine.current_index() + 1,
        engine.total_questions(),
        question.content
    );
    for (i, option) in question.options.iter().enumerate() {
        println!("  {}. {option}", option_label(i));
    }
    let hint = match question.kind {
        QuestionType::Single => "letter",
        QuestionType::Multiple => "letters, e.g. AC",
        QuestionType::Judge => "true/false",
        QuestionType::Essay => "free text",
    };
    if let Some(staged) = engine.staged_answer(question.id) {
        println!("(current answer: {})", staged.answer);
    }
    println!("Answer ({hint}, empty to skip, {QUIT} to save and quit):");
}

fn print_summary(summary: &QuizSummary) {
    let mut table = Table::new();
    table.set_header(vec!["Bank", "Mode", "Answered", "Correct", "Accuracy", "Time"]);
    table.add_row(vec![
        summary.bank_id.to_string(),
        summary.mode.to_string(),
        format!("{}/{}", summary.stats.total, summary.total_questions),
        summary.correct_count.to_string(),
        format!("{}%", summary.stats.accuracy),
        format!("{}s", summary.duration_secs),
    ]);
    println!("\n{table}");
    println!("Score: {}/{}", summary.correct_count, summary.total_questions);
}
