//! Executor: the per-task phase sequencer. Drives a
//! `Plan` to completion or error, orchestrating Validator -> Builder ->
//! Verifier -> Reviewer, honoring retry/cycle budgets, and persisting
//! after every status change.

use std::collections::HashSet;
use std::path::Path;

use orchestrator_kernel::scheduler::{next_phase, phase_requires_builder_first, ready_dependencies, DependencyReadiness};
use orchestrator_kernel::{Plan, Task, TaskPhase, TaskStatus, TrustLevel};
use tokio_util::sync::CancellationToken;

use crate::batch::{self, BatchDispatch, JobVarInputs};
use crate::builder::BuildContext;
use crate::error::OrchestratorError;
use crate::ports::{ModelClient, ToolRegistry};
use crate::reviewer::{self, ReviewInput};
use crate::risk_guard::LongRunGuard;
use crate::validator::validate;
use crate::verifier::{VerifyContext, VerifyResult, verify};
use crate::workflow::{WorkflowController, WorkflowPhase};

pub struct ExecutorContext<'a> {
    pub project_root: &'a Path,
    pub plan_dir: &'a Path,
    pub model: &'a dyn ModelClient,
    pub model_name: String,
    pub tools: &'a dyn ToolRegistry,
    pub workflow: &'a WorkflowController,
    /// When set, every task is dispatched to the remote batch runtime
    /// instead of the local phase walk (§4.8). `None` is the default,
    /// all-local path.
    pub batch: Option<BatchDispatch<'a>>,
    /// When set, gates unattended runs on duration/check-in budgets and
    /// pauses the run when a task's description crosses the configured
    /// risk threshold (§4.9). `None` runs with no such budget.
    pub long_run_guard: Option<&'a LongRunGuard>,
}

pub struct Executor<'a> {
    ctx: ExecutorContext<'a>,
    cancellation: CancellationToken,
}

impl<'a> Executor<'a> {
    pub fn new(ctx: ExecutorContext<'a>) -> Self {
        Self { ctx, cancellation: CancellationToken::new() }
    }

    /// Replaces the cancellation root. The executor never silently falls
    /// back to an always-succeeds default context once this is called.
    pub fn set_context(&mut self, token: CancellationToken) {
        self.cancellation = token;
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    fn persist(&self, plan: &Plan) {
        if let Err(e) = crate::plan_store::save_plan(self.ctx.plan_dir, plan) {
            eprintln!("warning: failed to persist plan `{}`: {e}", plan.id);
        }
    }

    pub async fn execute(&self, plan: &mut Plan) -> Result<(), OrchestratorError> {
        self.ctx.workflow.set_plan_id(plan.id.clone());
        self.ctx.workflow.set_phase(WorkflowPhase::Execution);

        for i in 0..plan.tasks.len() {
            if self.cancellation.is_cancelled() {
                return Err(OrchestratorError::Cancelled);
            }

            if plan.tasks[i].status == TaskStatus::Completed {
                continue;
            }

            if let Some(guard) = self.ctx.long_run_guard {
                guard.record_operation();
                if guard.needs_check_in() {
                    let (should_continue, reason) = guard.check_in();
                    if !should_continue {
                        return Err(self.ctx.workflow.pause(reason.unwrap_or_else(|| "long-run guard paused the run".to_string()), None).into());
                    }
                }

                let task = &plan.tasks[i];
                let assessment = orchestrator_kernel::risk::analyze(&format!("{} {}", task.title, task.description));
                if guard.should_pause_for_risk(&assessment) {
                    return Err(self
                        .ctx
                        .workflow
                        .pause(
                            format!("task `{}` crosses the configured risk threshold ({:?})", task.id, assessment.level),
                            Some("continue running this unattended plan?".to_string()),
                        )
                        .into());
                }
            }

            let siblings = plan.tasks.clone();
            let readiness = ready_dependencies(&plan.tasks[i], &siblings);
            if let DependencyReadiness::Unmet(missing) = readiness {
                return Err(OrchestratorError::UnmetDependencies { task_id: plan.tasks[i].id.clone(), missing });
            }

            self.run_task(plan, i).await?;
            self.persist(plan);
        }

        Ok(())
    }

    fn record_journal_row(&self, plan: &Plan, task_id: &str, started_at: chrono::DateTime<chrono::Utc>, status: &str, verify_result: Option<&VerifyResult>, validation_errors: Vec<String>) {
        let completed_at = chrono::Utc::now();
        let row = crate::journal::JournalRow {
            plan_id: plan.id.clone(),
            task_id: task_id.to_string(),
            attempt: 1,
            status: status.to_string(),
            started_at: started_at.to_rfc3339(),
            completed_at: Some(completed_at.to_rfc3339()),
            execution_time_ms: Some((completed_at - started_at).num_milliseconds().max(0) as u64),
            retry_count: 0,
            validation_errors,
            verification_results: verify_result.map(|v| v.errors.clone()).unwrap_or_default(),
            artifacts: verify_result
                .map(|v| v.artifacts.iter().map(|a| a.id.clone()).collect())
                .unwrap_or_default(),
        };
        if let Err(e) = crate::journal::append_journal_row(self.ctx.plan_dir, &row) {
            eprintln!("warning: failed to append journal row for task `{task_id}`: {e}");
        }
    }

    async fn run_task(&self, plan: &mut Plan, index: usize) -> Result<(), OrchestratorError> {
        let task_id = plan.tasks[index].id.clone();
        let started_at = chrono::Utc::now();
        plan.tasks[index].status = TaskStatus::InProgress;
        self.persist(plan);
        self.ctx.workflow.emit_telemetry("task.started", Some(&task_id), None);

        let validation = validate(self.ctx.project_root, &plan.tasks[index], self.ctx.tools);
        if !validation.valid {
            plan.tasks[index].status = TaskStatus::Failed;
            self.ctx.workflow.emit_telemetry(
                "task.failed",
                Some(&task_id),
                Some(serde_json::json!({"errors": validation.errors})),
            );
            self.record_journal_row(plan, &task_id, started_at, "failed", None, validation.errors.clone());
            return Ok(());
        }

        if self.ctx.batch.is_some() {
            return self.run_task_batch(plan, index, started_at).await;
        }

        let task_phases = plan.config.task_phases.clone();
        let trust_level = plan.config.trust_level;
        let max_retries = plan.config.max_retries;
        let max_review_cycles = plan.config.max_review_cycles;
        let allow_nits = plan.config.allow_nits_in_approval;
        let guard_scope = plan.config.pause_on_architectural_conflict;

        let mut completed_phases: HashSet<TaskPhase> = HashSet::new();
        let mut last_verify: Option<VerifyResult> = None;

        loop {
            let Some(phase) = next_phase(&task_phases, &completed_phases) else { break };

            if phase_requires_builder_first(phase, &completed_phases) {
                self.run_builder_phase(plan, index).await?;
                completed_phases.insert(TaskPhase::Builder);
                if phase == TaskPhase::Builder {
                    continue;
                }
            }

            match phase {
                TaskPhase::Builder => {
                    self.run_builder_phase(plan, index).await?;
                }
                TaskPhase::Verify => {
                    let verify_result = self.run_verify_phase(plan, index).await?;
                    if !verify_result.passed {
                        plan.tasks[index].status = TaskStatus::Failed;
                        self.ctx.workflow.emit_telemetry("task.failed", Some(&task_id), None);
                        self.record_journal_row(plan, &task_id, started_at, "failed", Some(&verify_result), vec![]);
                        return Ok(());
                    }
                    last_verify = Some(verify_result);
                }
                TaskPhase::Review => {
                    if trust_level == TrustLevel::Autonomous {
                        // Autonomous trust level makes the reviewer
                        // phase a no-op.
                        completed_phases.insert(TaskPhase::Review);
                        continue;
                    }

                    match self.run_review_cycle(plan, index, max_review_cycles, allow_nits, max_retries, guard_scope).await {
                        Ok(true) => {}
                        Ok(false) => {
                            let message = format!("review blocked after {max_review_cycles} cycles");
                            plan.tasks[index].status = TaskStatus::Failed;
                            self.ctx.workflow.emit_telemetry(
                                "task.failed",
                                Some(&task_id),
                                Some(serde_json::json!({"error": message})),
                            );
                            self.record_journal_row(plan, &task_id, started_at, "failed", last_verify.as_ref(), vec![message]);
                            return Ok(());
                        }
                        // A pause unwinds the stage regardless of trust
                        // level; it is never a reviewer error to swallow.
                        Err(e @ OrchestratorError::Paused(_)) => return Err(e),
                        Err(e) if trust_level == TrustLevel::Conservative => return Err(e),
                        Err(_) if trust_level == TrustLevel::Balanced => {
                            // reviewer transport/parse errors are logged and
                            // swallowed under balanced trust to keep progress.
                            eprintln!("warning: reviewer error swallowed under balanced trust level");
                        }
                        Err(e) => return Err(e),
                    }
                }
            }

            completed_phases.insert(phase);
        }

        plan.tasks[index].status = TaskStatus::Completed;
        self.ctx.workflow.emit_telemetry("task.completed", Some(&task_id), None);
        self.record_journal_row(plan, &task_id, started_at, "completed", last_verify.as_ref(), vec![]);
        Ok(())
    }

    /// Alternative to the local phase walk: renders a job spec for this
    /// task, dispatches it to the batch runtime, and on success reloads
    /// the plan from disk (the remote side may have mutated artifacts)
    /// before re-anchoring and completing the task by ID.
    async fn run_task_batch(&self, plan: &mut Plan, index: usize, started_at: chrono::DateTime<chrono::Utc>) -> Result<(), OrchestratorError> {
        let batch = self.ctx.batch.as_ref().expect("run_task_batch called without a batch dispatcher");
        let task_id = plan.tasks[index].id.clone();

        let vars = {
            let task = &plan.tasks[index];
            let inputs = JobVarInputs {
                plan_id: &plan.id,
                feature: &plan.feature_name,
                repo_url: plan.context.remote_url.as_deref().unwrap_or(""),
                git_branch: plan.context.git_branch.as_deref().unwrap_or(""),
                remote_branch: None,
                remote_name: None,
                namespace: &batch.template.namespace,
                workspace_dir: None,
            };
            batch::render_job_vars(task, &inputs)
        };

        match batch::dispatch(batch.runtime, &batch.template, &vars, batch.poll).await {
            Ok(logs) => {
                if let Some(logs) = logs {
                    self.ctx.workflow.send_progress(crate::display::ProgressEvent::for_task(
                        crate::display::ProgressKind::Info,
                        &task_id,
                        logs,
                    ));
                }

                let mut reloaded = batch::reload_and_reanchor(self.ctx.plan_dir, &plan.id, &task_id)
                    .map_err(OrchestratorError::Batch)?;
                if let Some(t) = reloaded.find_task_mut(&task_id) {
                    t.status = TaskStatus::Completed;
                }
                *plan = reloaded;
                self.ctx.workflow.emit_telemetry("task.completed", Some(&task_id), None);
                Ok(())
            }
            Err(e) => {
                plan.tasks[index].status = TaskStatus::Failed;
                self.ctx.workflow.emit_telemetry(
                    "task.failed",
                    Some(&task_id),
                    Some(serde_json::json!({"error": e.to_string()})),
                );
                Ok(())
            }
        }
    }

    async fn run_builder_phase(&self, plan: &mut Plan, index: usize) -> Result<(), OrchestratorError> {
        let task_id = plan.tasks[index].id.clone();
        self.ctx.workflow.emit_telemetry("builder.started", Some(&task_id), None);

        let build_ctx = BuildContext {
            model: self.ctx.model,
            tools: self.ctx.tools,
            workflow: self.ctx.workflow,
            model_name: self.ctx.model_name.clone(),
            allowed_tools: None,
        };

        let task = &plan.tasks[index];
        let prompt = crate::ports::ChatMessage {
            role: crate::ports::MessageRole::User,
            content: format!("Implement task `{}`: {}\n{}", task.id, task.title, task.description),
            tool_calls: vec![],
            tool_call_id: None,
        };

        let guard_scope = plan.config.pause_on_architectural_conflict;
        match crate::builder::run_builder(&build_ctx, vec![prompt], &task.files, guard_scope).await {
            Ok(_) => {
                self.ctx.workflow.emit_telemetry("builder.completed", Some(&task_id), None);
                Ok(())
            }
            // A pause unwinds the stage; it is not a build failure.
            Err(crate::builder::BuilderError::Paused(p)) => Err(OrchestratorError::Paused(p)),
            Err(e) => {
                self.ctx.workflow.emit_telemetry("builder.failed", Some(&task_id), None);
                Err(OrchestratorError::Builder(e))
            }
        }
    }

    async fn run_verify_phase(&self, plan: &Plan, index: usize) -> Result<VerifyResult, OrchestratorError> {
        let task = &plan.tasks[index];
        let ctx = VerifyContext { project_root: self.ctx.project_root };
        let first = verify(&ctx, task).await;
        if first.passed {
            return Ok(first);
        }

        let error_string = first.errors.join("; ");
        let build_ctx = BuildContext {
            model: self.ctx.model,
            tools: self.ctx.tools,
            workflow: self.ctx.workflow,
            model_name: self.ctx.model_name.clone(),
            allowed_tools: None,
        };

        match crate::self_heal::heal(&build_ctx, self.ctx.project_root, task, plan.config.max_retries, error_string).await {
            Ok(result) => Ok(result),
            // A pause unwinds the stage; it is not a self-heal failure.
            Err(crate::self_heal::SelfHealError::Paused(p)) => Err(OrchestratorError::Paused(p)),
            Err(e) => Err(OrchestratorError::SelfHeal(e)),
        }
    }

    /// Correction cycle: up to `max_review_cycles` rounds.
    /// Returns `Ok(true)` on approval, `Ok(false)` on cycle exhaustion.
    async fn run_review_cycle(
        &self,
        plan: &mut Plan,
        index: usize,
        max_review_cycles: u32,
        allow_nits: bool,
        max_retries: u32,
        guard_scope: bool,
    ) -> Result<bool, OrchestratorError> {
        for _round in 0..max_review_cycles {
            let task = plan.tasks[index].clone();
            let files: Vec<(String, String)> = task
                .files
                .iter()
                .filter_map(|f| {
                    std::fs::read_to_string(self.ctx.project_root.join(f))
                        .ok()
                        .map(|c| (f.clone(), c))
                })
                .collect();

            let input = ReviewInput { task_description: &task.description, files: &files, implementation_text: "" };
            let review = reviewer::request_review(self.ctx.model, &self.ctx.model_name, &input)
                .await
                .map_err(OrchestratorError::Reviewer)?;

            if reviewer::evaluate(&review, allow_nits) {
                return Ok(true);
            }

            let build_ctx = BuildContext {
                model: self.ctx.model,
                tools: self.ctx.tools,
                workflow: self.ctx.workflow,
                model_name: self.ctx.model_name.clone(),
                allowed_tools: None,
            };
            let issues_text = review
                .issues
                .iter()
                .map(|i| format!("- [{:?}] {}: {}", i.severity, i.title, i.description))
                .collect::<Vec<_>>()
                .join("\n");
            let prompt = crate::ports::ChatMessage {
                role: crate::ports::MessageRole::User,
                content: format!("Address the following review feedback for task `{}`:\n{issues_text}", task.id),
                tool_calls: vec![],
                tool_call_id: None,
            };

            crate::builder::run_builder(&build_ctx, vec![prompt], &task.files, guard_scope).await?;

            let verify_ctx = VerifyContext { project_root: self.ctx.project_root };
            let verify_result = verify(&verify_ctx, &task).await;
            if !verify_result.passed {
                return Err(OrchestratorError::SelfHeal(crate::self_heal::SelfHealError::MaxRetriesExceeded {
                    error: verify_result.errors.join("; "),
                    attempts: max_retries,
                }));
            }
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{ChatRequest, ChatResponse, ModelError, NullTelemetrySink, Tool, ToolResult, ToolSpec};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct PanicModelClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelClient for PanicModelClient {
        async fn chat_completion(&self, _request: ChatRequest) -> Result<ChatResponse, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ModelError("should never be called after cancellation".to_string()))
        }
        fn supports_reasoning(&self, _model: &str) -> bool {
            false
        }
    }

    struct EmptyToolRegistry;
    impl ToolRegistry for EmptyToolRegistry {
        fn get(&self, _name: &str) -> Option<&dyn Tool> {
            None
        }
        fn catalog(&self, _allow: Option<&[String]>) -> Vec<ToolSpec> {
            vec![]
        }
    }

    #[tokio::test]
    async fn cancelled_executor_makes_no_model_call_and_advances_no_task() {
        let root = tempfile::tempdir().unwrap();
        let plan_dir = tempfile::tempdir().unwrap();
        let model = PanicModelClient { calls: AtomicUsize::new(0) };
        let tools = EmptyToolRegistry;
        let workflow = WorkflowController::new("session-test", std::sync::Arc::new(NullTelemetrySink), "orchestrator");

        let ctx = ExecutorContext {
            project_root: root.path(),
            plan_dir: plan_dir.path(),
            model: &model,
            model_name: "test-model".to_string(),
            tools: &tools,
            workflow: &workflow,
            batch: None,
            long_run_guard: None,
        };
        let mut executor = Executor::new(ctx);
        let token = CancellationToken::new();
        token.cancel();
        executor.set_context(token);

        let mut plan = Plan {
            id: "pln_test".to_string(),
            feature_name: "feature".to_string(),
            description: String::new(),
            tasks: vec![Task::new("1", "do a thing", orchestrator_kernel::TaskType::Implementation)],
            context: orchestrator_kernel::PlanContext::default(),
            config: orchestrator_kernel::PlanConfig::default(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        };

        let result = executor.execute(&mut plan).await;
        assert!(matches!(result, Err(OrchestratorError::Cancelled)));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert_eq!(plan.tasks[0].status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn long_run_guard_pauses_before_a_high_risk_task_runs() {
        let root = tempfile::tempdir().unwrap();
        let plan_dir = tempfile::tempdir().unwrap();
        let model = PanicModelClient { calls: AtomicUsize::new(0) };
        let tools = EmptyToolRegistry;
        let workflow = WorkflowController::new("session-test", std::sync::Arc::new(NullTelemetrySink), "orchestrator");
        let guard = crate::risk_guard::LongRunGuard::new(std::time::Duration::from_secs(3600), std::time::Duration::from_secs(3600));

        let ctx = ExecutorContext {
            project_root: root.path(),
            plan_dir: plan_dir.path(),
            model: &model,
            model_name: "test-model".to_string(),
            tools: &tools,
            workflow: &workflow,
            batch: None,
            long_run_guard: Some(&guard),
        };
        let executor = Executor::new(ctx);

        let mut task = Task::new("1", "force-push the release branch", orchestrator_kernel::TaskType::Implementation);
        task.description = "git push origin main --force to rewrite history".to_string();
        let mut plan = Plan {
            id: "pln_risky".to_string(),
            feature_name: "feature".to_string(),
            description: String::new(),
            tasks: vec![task],
            context: orchestrator_kernel::PlanContext::default(),
            config: orchestrator_kernel::PlanConfig::default(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        };

        let result = executor.execute(&mut plan).await;
        assert!(matches!(result, Err(OrchestratorError::Paused(_))));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert_eq!(plan.tasks[0].status, TaskStatus::Pending);
        assert_eq!(guard.risk_events(), 1);
    }
}
