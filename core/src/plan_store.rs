//! Plan persistence: one JSON file (canonical) and one regenerated
//! Markdown file per plan ID, written atomically via a
//! temp-file-then-persist pattern so a crash mid-write never leaves a
//! truncated plan on disk.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use orchestrator_kernel::Plan;

pub const DEFAULT_PLAN_DIR: &str = ".orchestrator/plans";

pub fn plan_json_path(dir: &Path, plan_id: &str) -> PathBuf {
    dir.join(format!("{plan_id}.json"))
}

pub fn plan_markdown_path(dir: &Path, plan_id: &str) -> PathBuf {
    dir.join(format!("{plan_id}.md"))
}

fn write_atomic(destination: &Path, contents: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let parent = destination
        .parent()
        .ok_or("invalid plan path: missing parent directory")?;
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.flush()?;
    tmp.persist(destination)?;
    Ok(())
}

/// Persists both the canonical JSON and the regenerated Markdown view.
/// Best-effort: a write failure here is logged by the caller as a
/// warning and does not fail the task in progress.
pub fn save_plan(dir: &Path, plan: &Plan) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let json = serde_json::to_string_pretty(plan)?;
    write_atomic(&plan_json_path(dir, &plan.id), &json)?;
    write_atomic(&plan_markdown_path(dir, &plan.id), &render_markdown(plan))?;
    Ok(())
}

pub fn load_plan(dir: &Path, plan_id: &str) -> Result<Plan, Box<dyn std::error::Error + Send + Sync>> {
    let raw = fs::read_to_string(plan_json_path(dir, plan_id))?;
    Ok(serde_json::from_str(&raw)?)
}

fn render_markdown(plan: &Plan) -> String {
    let mut doc = String::new();
    doc.push_str(&format!("# {}\n\n", plan.feature_name));
    doc.push_str(&format!("plan id: `{}`\n\n", plan.id));
    if !plan.description.is_empty() {
        doc.push_str(&plan.description);
        doc.push_str("\n\n");
    }
    doc.push_str("## Tasks\n\n");
    for task in &plan.tasks {
        doc.push_str(&format!(
            "- [{}] **{}** — {}\n",
            status_box(task.status),
            task.id,
            task.title
        ));
        if !task.dependencies.is_empty() {
            doc.push_str(&format!("  - depends on: {}\n", task.dependencies.join(", ")));
        }
    }
    doc
}

fn status_box(status: orchestrator_kernel::TaskStatus) -> &'static str {
    use orchestrator_kernel::TaskStatus::*;
    match status {
        Completed => "x",
        Failed => "!",
        Skipped => "-",
        InProgress => "~",
        Pending => " ",
    }
}
