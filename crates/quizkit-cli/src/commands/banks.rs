//! The `quizkit banks` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::Table;

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let ctx = super::context(config_path)?;
    let banks = ctx.client().banks().await?;

    if banks.is_empty() {
        println!("No question banks available.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Questions", "Description"]);
    for bank in &banks {
        table.add_row(vec![
            bank.id.to_string(),
            bank.name.clone(),
            bank.question_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".into()),
            bank.description.clone().unwrap_or_default(),
        ]);
    }
    println!("{table}");
    Ok(())
}
