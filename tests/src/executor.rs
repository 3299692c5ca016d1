//! End-to-end: `Executor::execute` driving a two-task plan through a
//! scripted model and a filesystem tool registry, with the reviewer
//! phase a no-op under autonomous trust.

use std::sync::Arc;

use orchestrator_core::executor::{Executor, ExecutorContext};
use orchestrator_core::ports::NullTelemetrySink;
use orchestrator_core::workflow::WorkflowController;
use orchestrator_kernel::{Plan, PlanConfig, PlanContext, Task, TaskPhase, TaskStatus, TaskType, TrustLevel};

use crate::fixtures::{FsToolRegistry, ScriptedModelClient};

fn plan_with_two_dependent_tasks() -> Plan {
    let mut first = Task::new("1", "write a", TaskType::Implementation);
    first.files = vec!["a.txt".to_string()];

    let mut second = Task::new("2", "write b", TaskType::Implementation);
    second.files = vec!["b.txt".to_string()];
    second.dependencies = vec!["1".to_string()];

    Plan {
        id: "pln_test".to_string(),
        feature_name: "two files".to_string(),
        description: String::new(),
        tasks: vec![first, second],
        context: PlanContext::default(),
        config: PlanConfig {
            task_phases: vec![TaskPhase::Builder, TaskPhase::Verify, TaskPhase::Review],
            trust_level: TrustLevel::Autonomous,
            ..PlanConfig::default()
        },
        created_at: "2026-01-01T00:00:00Z".to_string(),
        updated_at: "2026-01-01T00:00:00Z".to_string(),
    }
}

#[tokio::test]
async fn executes_dependent_tasks_in_order_and_persists() {
    let project_root = tempfile::tempdir().unwrap();
    let plan_dir = tempfile::tempdir().unwrap();
    let mut plan = plan_with_two_dependent_tasks();

    let model = ScriptedModelClient::new(vec![
        ScriptedModelClient::text_response("```filepath:a.txt\nhello a\n```"),
        ScriptedModelClient::text_response("```filepath:b.txt\nhello b\n```"),
    ]);
    let tools = FsToolRegistry::new(project_root.path());
    let workflow = WorkflowController::new("session-1", Arc::new(NullTelemetrySink), "orchestrator");

    let ctx = ExecutorContext {
        project_root: project_root.path(),
        plan_dir: plan_dir.path(),
        model: &model,
        model_name: "test-model".to_string(),
        tools: &tools,
        workflow: &workflow,
        batch: None,
        long_run_guard: None,
    };
    let executor = Executor::new(ctx);

    executor.execute(&mut plan).await.expect("execution should succeed");

    assert_eq!(plan.tasks[0].status, TaskStatus::Completed);
    assert_eq!(plan.tasks[1].status, TaskStatus::Completed);
    assert!(project_root.path().join("a.txt").exists());
    assert!(project_root.path().join("b.txt").exists());

    let persisted = orchestrator_core::plan_store::load_plan(plan_dir.path(), &plan.id).unwrap();
    assert_eq!(persisted.tasks[0].status, TaskStatus::Completed);
}

#[tokio::test]
async fn unmet_dependency_fails_the_run_without_reordering() {
    let project_root = tempfile::tempdir().unwrap();
    let plan_dir = tempfile::tempdir().unwrap();

    let mut second = Task::new("2", "depends on missing", TaskType::Implementation);
    second.dependencies = vec!["missing".to_string()];
    let mut plan = Plan {
        id: "pln_bad".to_string(),
        feature_name: "broken".to_string(),
        description: String::new(),
        tasks: vec![second],
        context: PlanContext::default(),
        config: PlanConfig::default(),
        created_at: "2026-01-01T00:00:00Z".to_string(),
        updated_at: "2026-01-01T00:00:00Z".to_string(),
    };

    let model = ScriptedModelClient::new(vec![]);
    let tools = FsToolRegistry::new(project_root.path());
    let workflow = WorkflowController::new("session-2", Arc::new(NullTelemetrySink), "orchestrator");

    let ctx = ExecutorContext {
        project_root: project_root.path(),
        plan_dir: plan_dir.path(),
        model: &model,
        model_name: "test-model".to_string(),
        tools: &tools,
        workflow: &workflow,
        batch: None,
        long_run_guard: None,
    };
    let executor = Executor::new(ctx);

    let err = executor.execute(&mut plan).await.unwrap_err();
    assert!(matches!(err, orchestrator_core::OrchestratorError::UnmetDependencies { .. }));
}

#[tokio::test]
async fn batch_dispatch_reloads_plan_and_completes_task_without_a_model_call() {
    use orchestrator_core::batch::{BatchDispatch, JobTemplate};

    let project_root = tempfile::tempdir().unwrap();
    let plan_dir = tempfile::tempdir().unwrap();

    let mut plan = Plan {
        id: "pln_batch".to_string(),
        feature_name: "remote build".to_string(),
        description: String::new(),
        tasks: vec![Task::new("1", "build remotely", TaskType::Implementation)],
        context: PlanContext::default(),
        config: PlanConfig::default(),
        created_at: "2026-01-01T00:00:00Z".to_string(),
        updated_at: "2026-01-01T00:00:00Z".to_string(),
    };
    // The batch path reloads from disk after dispatch, so seed it there first.
    orchestrator_core::plan_store::save_plan(plan_dir.path(), &plan).unwrap();

    let model = ScriptedModelClient::new(vec![]);
    let tools = FsToolRegistry::new(project_root.path());
    let workflow = WorkflowController::new("session-3", Arc::new(NullTelemetrySink), "orchestrator");
    let runtime = crate::fixtures::AlwaysSucceedsBatchRuntime::new();
    let template = JobTemplate {
        name_template: "job-[[TASK_SLUG]]".to_string(),
        command_template: vec!["run.sh".to_string()],
        env_template: std::collections::HashMap::new(),
        namespace: "default".to_string(),
        backoff_limit: 2,
    };

    let ctx = ExecutorContext {
        project_root: project_root.path(),
        plan_dir: plan_dir.path(),
        model: &model,
        model_name: "test-model".to_string(),
        tools: &tools,
        workflow: &workflow,
        batch: Some(BatchDispatch { runtime: &runtime, template, poll: true }),
        long_run_guard: None,
    };
    let executor = Executor::new(ctx);

    executor.execute(&mut plan).await.expect("batch dispatch should succeed");

    assert_eq!(plan.tasks[0].status, TaskStatus::Completed);
    assert_eq!(runtime.created.lock().unwrap().len(), 1);
    assert!(model.requests_seen.lock().unwrap().is_empty(), "batch dispatch must not call the model");
}
