//! The `quizkit init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    if Path::new("quizkit.toml").exists() {
        println!("quizkit.toml already exists, skipping.");
    } else {
        std::fs::write("quizkit.toml", SAMPLE_CONFIG)?;
        println!("Created quizkit.toml");
    }

    println!("\nNext steps:");
    println!("  1. Point base_url in quizkit.toml at your quiz server");
    println!("  2. Run: quizkit login --username <name>");
    println!("  3. Run: quizkit banks");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# quizkit configuration

# API root of the quiz server
base_url = "http://localhost:9090/api"

# Per-request timeout in seconds
timeout_secs = 10

# Automatic retries for failed reads (at most 3); writes are never retried
retry_limit = 3
retry_delay_ms = 1000

# Response cache for banks and questions
cache_ttl_secs = 300
cache_max_entries = 256

# Send server-side failures to the report endpoint
report_errors = true
error_report_path = "/errors/report"

# Where the token and saved sessions live
# data_dir = "/home/me/.local/share/quizkit"
"#;
