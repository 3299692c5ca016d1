use crate::plan::{Task, TaskPhase, TaskStatus};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyReadiness {
    Ready,
    /// Names the sibling dependency IDs that are not yet `Completed`. The
    /// executor treats this as a hard failure of the whole run rather
    /// than a queued wait — tasks never get reordered to work around it.
    Unmet(Vec<String>),
}

/// Checks every ID in `task.dependencies` against `siblings`. A dependency
/// on a task that does not exist in `siblings` at all is reported the same
/// way as an incomplete one — the executor's "unmet dependencies" error
/// covers both.
pub fn ready_dependencies(task: &Task, siblings: &[Task]) -> DependencyReadiness {
    let mut unmet = Vec::new();

    for dep in &task.dependencies {
        let status = siblings.iter().find(|t| &t.id == dep).map(|t| t.status);
        match status {
            Some(TaskStatus::Completed) => {}
            _ => unmet.push(dep.clone()),
        }
    }

    if unmet.is_empty() {
        DependencyReadiness::Ready
    } else {
        DependencyReadiness::Unmet(unmet)
    }
}

/// Given the configured phase sequence and the set of phases already run
/// for this task in this attempt, returns the next phase to run (or
/// `None` once the sequence is exhausted).
pub fn next_phase(task_phases: &[TaskPhase], completed: &HashSet<TaskPhase>) -> Option<TaskPhase> {
    task_phases.iter().copied().find(|phase| !completed.contains(phase))
}

/// When verify or review is reached, the Builder phase runs lazily if it
/// has not already run for this task in this attempt. Answers whether
/// `phase` needs a Builder run first.
pub fn phase_requires_builder_first(phase: TaskPhase, completed: &HashSet<TaskPhase>) -> bool {
    matches!(phase, TaskPhase::Verify | TaskPhase::Review) && !completed.contains(&TaskPhase::Builder)
}
