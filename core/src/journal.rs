//! Append-only execution journal keyed by `(plan_id, task_id, attempt)`,
//! plus the per-plan JSONL event logs for builder, reviewer, and
//! research events. Both are flat files under the plan directory;
//! nothing here is a database.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalRow {
    pub plan_id: String,
    pub task_id: String,
    pub attempt: u32,
    pub status: String,
    pub started_at: String,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub execution_time_ms: Option<u64>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub validation_errors: Vec<String>,
    #[serde(default)]
    pub verification_results: Vec<String>,
    #[serde(default)]
    pub artifacts: Vec<String>,
}

fn journal_path(dir: &Path, plan_id: &str) -> std::path::PathBuf {
    dir.join(format!("{plan_id}.journal.jsonl"))
}

fn event_log_path(dir: &Path, plan_id: &str, stream: &str) -> std::path::PathBuf {
    dir.join(format!("{plan_id}.{stream}.jsonl"))
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

pub fn append_journal_row(dir: &Path, row: &JournalRow) -> std::io::Result<()> {
    let line = serde_json::to_string(row).expect("JournalRow always serializes");
    append_line(&journal_path(dir, &row.plan_id), &line)
}

/// Appends one self-contained event object to the named stream
/// (`builder`, `reviewer`, or `research`) as a per-plan JSONL log file.
pub fn append_event(
    dir: &Path,
    plan_id: &str,
    stream: &str,
    event: &serde_json::Value,
) -> std::io::Result<()> {
    append_line(&event_log_path(dir, plan_id, stream), &event.to_string())
}
