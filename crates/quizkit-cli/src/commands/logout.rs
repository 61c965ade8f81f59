//! The `quizkit logout` command.

use std::path::PathBuf;

use anyhow::Result;

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let ctx = super::context(config_path)?;
    if ctx.credentials().token().is_none() {
        println!("Not logged in.");
        return Ok(());
    }
    if let Err(e) = ctx.client().logout().await {
        tracing::debug!("server logout failed: {e}");
    }
    println!("Logged out.");
    Ok(())
}
