//! JSON export.

use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;

use quizkit_core::session::QuizSummary;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Export<'a, T: Serialize + ?Sized> {
    generated_at: String,
    kind: &'static str,
    data: &'a T,
}

fn export<T: Serialize + ?Sized>(kind: &'static str, data: &T) -> Result<String> {
    let doc = Export {
        generated_at: Utc::now().to_rfc3339(),
        kind,
        data,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Pretty JSON of a session review wrapped with export metadata.
pub fn summary_json(summary: &QuizSummary) -> Result<String> {
    export("summary", summary)
}

/// Pretty JSON of any list, e.g. mistakes or favorites.
pub fn list_json<T: Serialize>(kind: &'static str, items: &[T]) -> Result<String> {
    export(kind, items)
}

pub fn write_summary_json(summary: &QuizSummary, path: &Path) -> Result<()> {
    crate::write_file(path, &summary_json(summary)?)
}
