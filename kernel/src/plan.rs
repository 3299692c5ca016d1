use serde::{Deserialize, Serialize};

/// Where a task currently sits in its lifecycle.
///
/// A task only ever moves forward through this sequence (`Pending` ->
/// `InProgress` -> `Completed`/`Failed`/`Skipped`); the executor never
/// resets a task backwards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped)
    }
}

/// What kind of work a task represents. Analysis/validation tasks are
/// permitted to produce zero files and skip the permission precheck.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Implementation,
    Analysis,
    Validation,
}

/// One step of the configured per-task phase sequence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Builder,
    Verify,
    Review,
}

impl TaskPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPhase::Builder => "builder",
            TaskPhase::Verify => "verify",
            TaskPhase::Review => "review",
        }
    }
}

/// Policy knob governing how review errors and unapproved reviews gate
/// progress. See [`crate::review::decide_approval`] for `Balanced`'s
/// swallow-transport-errors behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Autonomous,
    Balanced,
    Conservative,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub verification: Vec<String>,
    pub status: TaskStatus,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            task_type,
            files: Vec::new(),
            dependencies: Vec::new(),
            verification: Vec::new(),
            status: TaskStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanContext {
    #[serde(default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub research_summary: Option<String>,
    #[serde(default)]
    pub risks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanConfig {
    pub max_retries: u32,
    pub max_review_cycles: u32,
    pub trust_level: TrustLevel,
    pub allow_nits_in_approval: bool,
    pub pause_on_business_ambiguity: bool,
    pub pause_on_architectural_conflict: bool,
    pub task_phases: Vec<TaskPhase>,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_review_cycles: 2,
            trust_level: TrustLevel::Balanced,
            allow_nits_in_approval: true,
            pause_on_business_ambiguity: true,
            pause_on_architectural_conflict: true,
            task_phases: vec![TaskPhase::Builder, TaskPhase::Verify, TaskPhase::Review],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Plan {
    pub id: String,
    pub feature_name: String,
    pub description: String,
    pub tasks: Vec<Task>,
    pub context: PlanContext,
    pub config: PlanConfig,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyError {
    UnknownDependency { task: String, dependency: String },
    Cycle { cycle: Vec<String> },
}

impl std::fmt::Display for DependencyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyError::UnknownDependency { task, dependency } => write!(
                f,
                "task `{task}` declares dependency on unknown task `{dependency}`"
            ),
            DependencyError::Cycle { cycle } => {
                write!(f, "dependency cycle detected: {}", cycle.join(" -> "))
            }
        }
    }
}

impl std::error::Error for DependencyError {}

impl Plan {
    pub fn find_task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn find_task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Validates the dependency graph invariant: no cycle in
    /// `Dependencies`, and no task advances out of pending unless all
    /// declared dependencies are completed — the structural half
    /// (existence + acyclicity). Runtime
    /// completion gating is [`crate::scheduler::evaluate_dependencies`].
    pub fn validate_dependencies(&self) -> Result<(), DependencyError> {
        use std::collections::HashMap;

        let by_id: HashMap<&str, &Task> =
            self.tasks.iter().map(|t| (t.id.as_str(), t)).collect();

        for task in &self.tasks {
            for dep in &task.dependencies {
                if !by_id.contains_key(dep.as_str()) {
                    return Err(DependencyError::UnknownDependency {
                        task: task.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Visiting,
            Done,
        }
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut stack: Vec<&str> = Vec::new();

        fn visit<'a>(
            id: &'a str,
            by_id: &HashMap<&'a str, &'a Task>,
            marks: &mut HashMap<&'a str, Mark>,
            stack: &mut Vec<&'a str>,
        ) -> Result<(), DependencyError> {
            if let Some(Mark::Done) = marks.get(id) {
                return Ok(());
            }
            if let Some(Mark::Visiting) = marks.get(id) {
                let mut cycle: Vec<String> =
                    stack.iter().skip_while(|&&x| x != id).map(|s| s.to_string()).collect();
                cycle.push(id.to_string());
                return Err(DependencyError::Cycle { cycle });
            }

            marks.insert(id, Mark::Visiting);
            stack.push(id);

            if let Some(task) = by_id.get(id) {
                for dep in &task.dependencies {
                    visit(dep.as_str(), by_id, marks, stack)?;
                }
            }

            stack.pop();
            marks.insert(id, Mark::Done);
            Ok(())
        }

        for task in &self.tasks {
            visit(task.id.as_str(), &by_id, &mut marks, &mut stack)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, deps: &[&str]) -> Task {
        let mut t = Task::new(id, id, TaskType::Implementation);
        t.dependencies = deps.iter().map(|s| s.to_string()).collect();
        t
    }

    fn plan(tasks: Vec<Task>) -> Plan {
        Plan {
            id: "pln_test".to_string(),
            feature_name: "feature".to_string(),
            description: "desc".to_string(),
            tasks,
            context: PlanContext::default(),
            config: PlanConfig::default(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn accepts_a_dag() {
        let p = plan(vec![task("a", &[]), task("b", &["a"]), task("c", &["b"])]);
        assert!(p.validate_dependencies().is_ok());
    }

    #[test]
    fn rejects_unknown_dependency() {
        let p = plan(vec![task("b", &["0"])]);
        let err = p.validate_dependencies().unwrap_err();
        assert!(matches!(err, DependencyError::UnknownDependency { .. }));
    }

    #[test]
    fn rejects_cycle() {
        let p = plan(vec![task("a", &["b"]), task("b", &["a"])]);
        let err = p.validate_dependencies().unwrap_err();
        assert!(matches!(err, DependencyError::Cycle { .. }));
    }
}
