//! The `quizkit token` command.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};

use quizkit_core::token;

pub fn execute(raw: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let raw = match raw {
        Some(t) => t,
        None => match super::context(config_path)?.credentials().token() {
            Some(t) => t,
            None => {
                println!("No stored token.");
                return Ok(());
            }
        },
    };

    let now = Utc::now();
    let Some(exp) = token::expiry_of(&raw) else {
        println!("Malformed token (treated as expired).");
        return Ok(());
    };

    let at = DateTime::from_timestamp(exp, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| exp.to_string());
    if token::is_valid(&raw, now) {
        println!(
            "Valid, expires at {at} (in {})",
            token::format_remaining(token::remaining_seconds(&raw, now))
        );
    } else {
        println!("Expired at {at}");
    }
    Ok(())
}
