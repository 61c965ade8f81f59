//! quizkit-report — Render session reviews, mistakes and favorites.

pub mod json;
pub mod markdown;

use std::path::Path;

use anyhow::Result;

/// Write `content` to `path`, creating parent directories.
pub(crate) fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}
