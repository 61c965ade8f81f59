//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use quizkit_client::{load_config_from, QuizContext};
use quizkit_core::classify::ErrorInfo;
use quizkit_core::traits::Notifier;

pub mod banks;
pub mod favorites;
pub mod init;
pub mod login;
pub mod logout;
pub mod mistakes;
pub mod quiz;
pub mod token;
pub mod whoami;

/// Prints shown errors to stderr.
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, info: &ErrorInfo) {
        eprintln!("warning: {}", info.message);
    }
}

/// Load config and build the shared client context.
pub(crate) fn context(config_path: Option<PathBuf>) -> Result<QuizContext> {
    let config = load_config_from(config_path.as_deref())?;
    QuizContext::open(config, Arc::new(StderrNotifier)).context("failed to set up client")
}

/// Output format chosen from a report path's extension.
pub(crate) enum ReportFormat {
    Markdown,
    Json,
}

impl ReportFormat {
    pub(crate) fn for_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("md") | Some("markdown") => Ok(ReportFormat::Markdown),
            Some("json") => Ok(ReportFormat::Json),
            _ => anyhow::bail!(
                "unsupported report format for {} (use .md or .json)",
                path.display()
            ),
        }
    }
}

/// Write `content` to `path`, creating parent directories.
pub(crate) fn write_report(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("failed to write report: {}", path.display()))?;
    println!("Report written to {}", path.display());
    Ok(())
}
