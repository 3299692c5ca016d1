//! Batch dispatch: the alternative to running tasks locally, which
//! renders a job spec, creates/polls/tails a remote execution, then
//! reloads the plan from disk. The Kubernetes API surface is a port so
//! `core` stays free of a `kube`/k8s-openapi dependency; `cli` (or a
//! test double) supplies the concrete client.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use orchestrator_kernel::Task;
use orchestrator_kernel::slug::render_template;

#[derive(Debug)]
pub enum BatchError {
    Job(String),
    Reload(String),
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Job(e) => write!(f, "batch job error: {e}"),
            Self::Reload(e) => write!(f, "failed to reload plan after batch run: {e}"),
        }
    }
}

impl std::error::Error for BatchError {}

#[derive(Debug, Clone)]
pub struct JobTemplate {
    pub name_template: String,
    pub command_template: Vec<String>,
    pub env_template: HashMap<String, String>,
    pub namespace: String,
    pub backoff_limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Minimal Kubernetes job surface this module needs. A real
/// implementation wraps the `kube` client; tests substitute a fake.
#[async_trait]
pub trait BatchRuntime: Send + Sync {
    async fn delete_job(&self, namespace: &str, name: &str) -> Result<(), BatchError>;
    async fn create_job(&self, namespace: &str, name: &str, command: &[String], env: &HashMap<String, String>, backoff_limit: u32) -> Result<(), BatchError>;
    async fn job_status(&self, namespace: &str, name: &str) -> Result<JobStatus, BatchError>;
    async fn tail_logs(&self, namespace: &str, name: &str) -> Result<String, BatchError>;
}

/// Variables substituted into a batch job spec template.
/// `remote_branch`/`remote_name`/`workspace_dir` are optional: a plan
/// dispatched before a branch has been pushed, or run against a
/// workspace-dir-less runtime, simply leaves those placeholders
/// unresolved in the rendered template.
pub struct JobVarInputs<'a> {
    pub plan_id: &'a str,
    pub feature: &'a str,
    pub repo_url: &'a str,
    pub git_branch: &'a str,
    pub remote_branch: Option<&'a str>,
    pub remote_name: Option<&'a str>,
    pub namespace: &'a str,
    pub workspace_dir: Option<&'a str>,
}

pub fn render_job_vars(task: &Task, inputs: &JobVarInputs<'_>) -> HashMap<String, String> {
    let task_slug = orchestrator_kernel::slug::slug_from_text(&task.title, 6, orchestrator_kernel::slug::KUBERNETES_LABEL_MAX_LEN);
    let mut vars = HashMap::new();
    vars.insert("PLAN_ID".to_string(), inputs.plan_id.to_string());
    vars.insert("TASK_ID".to_string(), task.id.clone());
    vars.insert("TASK_TITLE".to_string(), task.title.clone());
    vars.insert("TASK_SLUG".to_string(), task_slug);
    vars.insert("TASK_TYPE".to_string(), format!("{:?}", task.task_type).to_ascii_lowercase());
    vars.insert("FEATURE".to_string(), inputs.feature.to_string());
    vars.insert("REPO_URL".to_string(), inputs.repo_url.to_string());
    vars.insert("GIT_BRANCH".to_string(), inputs.git_branch.to_string());
    vars.insert("NAMESPACE".to_string(), inputs.namespace.to_string());
    if let Some(remote_branch) = inputs.remote_branch {
        vars.insert("REMOTE_BRANCH".to_string(), remote_branch.to_string());
    }
    if let Some(remote_name) = inputs.remote_name {
        vars.insert("REMOTE_NAME".to_string(), remote_name.to_string());
    }
    if let Some(workspace_dir) = inputs.workspace_dir {
        vars.insert("WORKSPACE_DIR".to_string(), workspace_dir.to_string());
    }
    vars
}

pub fn render_job_name(template: &JobTemplate, vars: &HashMap<String, String>) -> String {
    let rendered = render_template(&template.name_template, vars);
    orchestrator_kernel::slug::normalize_slug(&rendered, orchestrator_kernel::slug::KUBERNETES_NAME_MAX_LEN)
}

/// Wires a `BatchRuntime` and job template into an `Executor`. Its mere
/// presence on `ExecutorContext` is the "batch coordinator enabled"
/// condition that routes a task's dispatch to the remote path instead
/// of the local phase walk.
pub struct BatchDispatch<'a> {
    pub runtime: &'a dyn BatchRuntime,
    pub template: JobTemplate,
    pub poll: bool,
}

/// Runs a task through the batch path: idempotent delete-then-create,
/// optional poll to terminal status, optional log tail, then a plan
/// reload so the caller can re-anchor the task by ID.
pub async fn dispatch(
    runtime: &dyn BatchRuntime,
    template: &JobTemplate,
    vars: &HashMap<String, String>,
    poll: bool,
) -> Result<Option<String>, BatchError> {
    let name = render_job_name(template, vars);
    let command: Vec<String> = template.command_template.iter().map(|c| render_template(c, vars)).collect();
    let env: HashMap<String, String> = template.env_template.iter().map(|(k, v)| (k.clone(), render_template(v, vars))).collect();

    runtime.delete_job(&template.namespace, &name).await?;
    runtime.create_job(&template.namespace, &name, &command, &env, template.backoff_limit).await?;

    if !poll {
        return Ok(None);
    }

    loop {
        match runtime.job_status(&template.namespace, &name).await? {
            JobStatus::Succeeded => {
                let logs = runtime.tail_logs(&template.namespace, &name).await.ok();
                return Ok(logs);
            }
            JobStatus::Failed => {
                return Err(BatchError::Job(format!("job `{name}` failed")));
            }
            JobStatus::Pending | JobStatus::Running => {
                tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            }
        }
    }
}

/// Reloads the plan from disk after a batch run (the remote side may
/// have mutated artifacts) and re-anchors `task_id` by ID.
pub fn reload_and_reanchor(
    dir: &Path,
    plan_id: &str,
    task_id: &str,
) -> Result<orchestrator_kernel::Plan, BatchError> {
    let plan = crate::plan_store::load_plan(dir, plan_id).map_err(|e| BatchError::Reload(e.to_string()))?;
    if plan.find_task(task_id).is_none() {
        return Err(BatchError::Reload(format!("task `{task_id}` missing after reload")));
    }
    Ok(plan)
}
