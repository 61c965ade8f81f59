//! The `quizkit mistakes` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::Table;

use quizkit_client::Page;
use quizkit_report::{json, markdown};

use super::ReportFormat;

pub async fn execute(
    mastered: Option<u64>,
    unmastered: Option<u64>,
    page: u32,
    report: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let format = report.as_deref().map(ReportFormat::for_path).transpose()?;
    let ctx = super::context(config_path)?;
    let client = ctx.client();

    if let Some(id) = mastered {
        client.mark_mastered(id, true).await?;
        println!("Question {id} marked as mastered.");
        return Ok(());
    }
    if let Some(id) = unmastered {
        client.mark_mastered(id, false).await?;
        println!("Question {id} marked as not mastered.");
        return Ok(());
    }

    let result = client
        .wrong_questions(Page {
            current: page,
            ..Page::default()
        })
        .await?;

    if result.records.is_empty() {
        println!("No mistakes to review.");
    } else {
        let mut table = Table::new();
        table.set_header(vec!["Question", "Content", "Times wrong", "Last answer", "Mastered"]);
        for m in &result.records {
            table.add_row(vec![
                m.question_id.to_string(),
                m.question.as_ref().map(|q| q.content.clone()).unwrap_or_default(),
                m.error_count.to_string(),
                m.last_error_answer.clone().unwrap_or_default(),
                if m.is_mastered() { "yes" } else { "no" }.to_string(),
            ]);
        }
        println!("{table}");
        println!("Page {}/{} ({} total)", result.current, result.pages.max(1), result.total);
    }

    if let (Some(path), Some(format)) = (report, format) {
        let content = match format {
            ReportFormat::Markdown => markdown::mistakes_markdown(&result.records),
            ReportFormat::Json => json::list_json("mistakes", &result.records)?,
        };
        super::write_report(&path, &content)?;
    }
    Ok(())
}
