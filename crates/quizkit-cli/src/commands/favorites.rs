//! The `quizkit favorites` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::Table;

use quizkit_client::Page;
use quizkit_report::{json, markdown};

use super::ReportFormat;

pub async fn execute(
    add: Option<u64>,
    remove: Option<u64>,
    notes: Option<String>,
    page: u32,
    report: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let format = report.as_deref().map(ReportFormat::for_path).transpose()?;
    let ctx = super::context(config_path)?;
    let client = ctx.client();

    if let Some(id) = add {
        client.add_favorite(id, None, notes.as_deref()).await?;
        println!("Added question {id} to favorites.");
        return Ok(());
    }
    if let Some(id) = remove {
        client.remove_favorite(id).await?;
        println!("Removed question {id} from favorites.");
        return Ok(());
    }

    let result = client
        .favorites(Page {
            current: page,
            ..Page::default()
        })
        .await?;
    if result.records.is_empty() {
        println!("No favorites yet.");
    } else {
        let mut table = Table::new();
        table.set_header(vec!["Question", "Bank", "Content", "Notes"]);
        for f in &result.records {
            table.add_row(vec![
                f.question_id.to_string(),
                f.bank_id.map(|b| b.to_string()).unwrap_or_default(),
                f.question.as_ref().map(|q| q.content.clone()).unwrap_or_default(),
                f.notes.clone().unwrap_or_default(),
            ]);
        }
        println!("{table}");
        println!("Page {}/{} ({} total)", result.current, result.pages.max(1), result.total);
    }

    if let (Some(path), Some(format)) = (report, format) {
        let content = match format {
            ReportFormat::Markdown => markdown::favorites_markdown(&result.records),
            ReportFormat::Json => json::list_json("favorites", &result.records)?,
        };
        super::write_report(&path, &content)?;
    }
    Ok(())
}
