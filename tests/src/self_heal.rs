//! Self-heal loop integration: a model that never creates the declared
//! file produces an identical verification error with no file-state
//! change, so the loop-detection guard must trip before `max_retries`.

use std::sync::Arc;

use orchestrator_core::builder::BuildContext;
use orchestrator_core::ports::NullTelemetrySink;
use orchestrator_core::self_heal::{SelfHealError, heal};
use orchestrator_core::workflow::WorkflowController;
use orchestrator_kernel::{Task, TaskType};

use crate::fixtures::{FsToolRegistry, ScriptedModelClient};

#[tokio::test]
async fn identical_failures_with_no_progress_trip_loop_detection() {
    let project_root = tempfile::tempdir().unwrap();
    let mut task = Task::new("1", "write out.txt", TaskType::Implementation);
    task.files = vec!["out.txt".to_string()];

    // Every attempt writes a file the task never declared, so `out.txt`
    // never appears and the verification error never changes.
    let model = ScriptedModelClient::new(vec![
        ScriptedModelClient::text_response("```filepath:other.txt\nnoise\n```"),
        ScriptedModelClient::text_response("```filepath:other.txt\nnoise\n```"),
        ScriptedModelClient::text_response("```filepath:other.txt\nnoise\n```"),
    ]);
    let tools = FsToolRegistry::new(project_root.path());
    let workflow = WorkflowController::new("session-1", Arc::new(NullTelemetrySink), "orchestrator");

    let build_ctx = BuildContext { model: &model, tools: &tools, workflow: &workflow, model_name: "test-model".to_string(), allowed_tools: None };

    let first_error = "`out.txt` was not found after the build".to_string();
    let result = heal(&build_ctx, project_root.path(), &task, 5, first_error).await;

    match result {
        Err(SelfHealError::LoopDetected { attempts, .. }) => assert_eq!(attempts, 2),
        other => panic!("expected LoopDetected, got {other:?}"),
    }
}

#[tokio::test]
async fn a_fix_that_creates_the_file_lets_verification_pass() {
    let project_root = tempfile::tempdir().unwrap();
    let mut task = Task::new("1", "write out.txt", TaskType::Implementation);
    task.files = vec!["out.txt".to_string()];

    let model = ScriptedModelClient::new(vec![ScriptedModelClient::text_response("```filepath:out.txt\nfixed\n```")]);
    let tools = FsToolRegistry::new(project_root.path());
    let workflow = WorkflowController::new("session-2", Arc::new(NullTelemetrySink), "orchestrator");

    let build_ctx = BuildContext { model: &model, tools: &tools, workflow: &workflow, model_name: "test-model".to_string(), allowed_tools: None };

    let result = heal(&build_ctx, project_root.path(), &task, 5, "`out.txt` was not found after the build".to_string())
        .await
        .expect("self-heal should succeed once the file exists");

    assert!(result.passed);
    assert!(project_root.path().join("out.txt").exists());
}
