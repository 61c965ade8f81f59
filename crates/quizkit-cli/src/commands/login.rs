//! The `quizkit login` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use quizkit_core::token::format_remaining;

pub async fn execute(
    username: String,
    password: Option<String>,
    remember: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let ctx = super::context(config_path)?;

    let password = match password.or_else(|| std::env::var("QUIZKIT_PASSWORD").ok()) {
        Some(p) => p,
        None => {
            eprint!("Password: ");
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            lines
                .next_line()
                .await?
                .context("no password given on stdin")?
        }
    };

    let user = ctx.client().login(&username, password.trim_end(), remember).await?;
    let name = user.nickname.as_deref().unwrap_or(&user.username);
    println!("Logged in as {name}");
    println!(
        "Token valid for {}",
        format_remaining(ctx.credentials().remaining_secs())
    );
    Ok(())
}
