//! Progress tracker: aggregates task status across
//! a plan into counts, a phase timeline, and an ETA projection. Render
//! helpers produce the one-line and table summaries consumed by the CLI
//! and by telemetry snapshots.

use chrono::{DateTime, Utc};
use orchestrator_kernel::{Plan, TaskPhase, TaskStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub completed: usize,
    pub in_progress: usize,
    pub failed: usize,
    pub pending: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct PhaseTimelineEntry {
    pub task_id: String,
    pub phase: TaskPhase,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub outcome: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    pub timeline: Vec<PhaseTimelineEntry>,
}

impl ProgressTracker {
    pub fn record_phase_start(&mut self, task_id: impl Into<String>, phase: TaskPhase, started_at: DateTime<Utc>) {
        self.timeline.push(PhaseTimelineEntry {
            task_id: task_id.into(),
            phase,
            started_at,
            ended_at: None,
            outcome: None,
        });
    }

    pub fn record_phase_end(&mut self, task_id: &str, phase: TaskPhase, ended_at: DateTime<Utc>, outcome: impl Into<String>) {
        if let Some(entry) = self
            .timeline
            .iter_mut()
            .rev()
            .find(|e| e.task_id == task_id && e.phase == phase && e.ended_at.is_none())
        {
            entry.ended_at = Some(ended_at);
            entry.outcome = Some(outcome.into());
        }
    }

    /// Mean wall-clock of completed task phases, used to project an ETA
    /// across remaining pending tasks.
    fn mean_phase_duration_seconds(&self) -> Option<f64> {
        let durations: Vec<f64> = self
            .timeline
            .iter()
            .filter_map(|e| e.ended_at.map(|end| (end - e.started_at).num_milliseconds() as f64 / 1000.0))
            .collect();
        if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum::<f64>() / durations.len() as f64)
        }
    }
}

pub fn status_counts(plan: &Plan) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for task in &plan.tasks {
        match task.status {
            TaskStatus::Completed => counts.completed += 1,
            TaskStatus::InProgress => counts.in_progress += 1,
            TaskStatus::Failed => counts.failed += 1,
            TaskStatus::Pending => counts.pending += 1,
            TaskStatus::Skipped => counts.skipped += 1,
        }
    }
    counts
}

/// Projects remaining wall-clock as `mean_phase_duration * phases_per_task
/// * remaining_pending_tasks`. Returns `None` until at least one phase has
/// completed (nothing to project from yet).
pub fn eta_seconds(plan: &Plan, tracker: &ProgressTracker) -> Option<f64> {
    let mean = tracker.mean_phase_duration_seconds()?;
    let counts = status_counts(plan);
    let phases_per_task = plan.config.task_phases.len().max(1) as f64;
    Some(mean * phases_per_task * counts.pending as f64)
}

pub fn render_summary_line(plan: &Plan) -> String {
    let counts = status_counts(plan);
    format!(
        "{}: {} completed, {} in-progress, {} failed, {} pending, {} skipped",
        plan.feature_name, counts.completed, counts.in_progress, counts.failed, counts.pending, counts.skipped
    )
}

pub fn render_table(plan: &Plan) -> String {
    let mut out = String::new();
    out.push_str("ID    STATUS       TITLE\n");
    for task in &plan.tasks {
        out.push_str(&format!("{:<5} {:<12} {}\n", task.id, format!("{:?}", task.status), task.title));
    }
    out
}
