//! Command dispatch: resolves global options into concrete paths, wires
//! the concrete `ModelClient`/`ToolRegistry`/`WorkflowController` and
//! hands off to `orchestrator_core::executor::Executor`. No retry,
//! review, or scheduling logic lives here — that's `core`'s job.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::{CommandFactory, Parser};
use serde::Deserialize;

use orchestrator_core::display::{self, Verbosity};
use orchestrator_core::executor::{Executor, ExecutorContext};
use orchestrator_core::ports::NullTelemetrySink;
use orchestrator_core::workflow::WorkflowController;
use orchestrator_core::{config as core_config, plan_store};
use orchestrator_kernel::{Plan, PlanConfig, PlanContext, Task, TaskType, TrustLevel};

use crate::cli::args::{Cli, Commands, GlobalOpts, NewArgs, RunArgs, ShowArgs, TrustArg};
use crate::errors::CliError;
use crate::model_client::HttpModelClient;
use crate::telemetry::StderrTelemetrySink;
use crate::tools::LocalToolRegistry;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    dispatch(cli).await.map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let project_root = resolve_project_root(&cli.global)?;
    let plan_dir = resolve_plan_dir(&cli.global, &project_root);

    match cli.command {
        Commands::Init => init(&project_root, &plan_dir),
        Commands::New(args) => new_plan(&cli.global, &project_root, &plan_dir, args),
        Commands::Run(args) => run_plan(&cli.global, &project_root, &plan_dir, args).await,
        Commands::Show(args) => show_plan(&plan_dir, args),
        Commands::List => list_plans(&plan_dir),
        Commands::Completions(args) => {
            print_completions(args.shell);
            Ok(())
        }
    }
}

fn resolve_project_root(global: &GlobalOpts) -> Result<PathBuf, CliError> {
    match &global.project_root {
        Some(path) => Ok(path.clone()),
        None => std::env::current_dir().map_err(|e| CliError(format!("failed to read current directory: {e}"))),
    }
}

fn resolve_plan_dir(global: &GlobalOpts, project_root: &Path) -> PathBuf {
    global
        .plan_dir
        .clone()
        .unwrap_or_else(|| project_root.join(plan_store::DEFAULT_PLAN_DIR))
}

fn default_cli_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".orchestrator").join("config.toml")
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"[model]
name = "gpt-4o"
api_base = "https://api.openai.com/v1"
api_key_env = "ORCHESTRATOR_API_KEY"
"#;

fn init(project_root: &Path, plan_dir: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(plan_dir).map_err(|e| CliError(format!("failed to create `{}`: {e}", plan_dir.display())))?;

    let config_path = default_cli_config_path(project_root);
    if !config_path.exists() {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CliError(e.to_string()))?;
        }
        std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)
            .map_err(|e| CliError(format!("failed to write `{}`: {e}", config_path.display())))?;
    }

    println!("initialized orchestrator workspace at {}", plan_dir.display());
    Ok(())
}

#[derive(Debug, Deserialize)]
struct TaskSpec {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "type")]
    task_type: TaskType,
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    verification: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PlanSpec {
    feature_name: String,
    #[serde(default)]
    description: String,
    tasks: Vec<TaskSpec>,
}

fn new_plan(global: &GlobalOpts, project_root: &Path, plan_dir: &Path, args: NewArgs) -> Result<(), CliError> {
    let raw = std::fs::read_to_string(&args.spec_file)
        .map_err(|e| CliError(format!("failed to read `{}`: {e}", args.spec_file.display())))?;
    let spec: PlanSpec = serde_json::from_str(&raw).map_err(|e| CliError(format!("invalid task spec: {e}")))?;

    let tasks = spec
        .tasks
        .into_iter()
        .map(|t| Task {
            id: t.id,
            title: t.title,
            description: t.description,
            task_type: t.task_type,
            files: t.files,
            dependencies: t.dependencies,
            verification: t.verification,
            status: orchestrator_kernel::TaskStatus::Pending,
        })
        .collect::<Vec<_>>();

    let base_config = core_config::load_layered(PlanConfig::default(), global.plan_config_file.as_deref())
        .map_err(|e| CliError(format!("failed to load plan config: {e}")))?;

    let now = Utc::now().to_rfc3339();
    let slug = orchestrator_kernel::slug::normalize_slug(&spec.feature_name, 40);
    let id = format!("pln_{slug}_{}", Utc::now().timestamp());

    let plan = Plan {
        id,
        feature_name: spec.feature_name,
        description: spec.description,
        tasks,
        context: PlanContext::default(),
        config: base_config,
        created_at: now.clone(),
        updated_at: now,
    };

    plan.validate_dependencies()
        .map_err(|e| CliError(format!("invalid task graph: {e}")))?;

    std::fs::create_dir_all(plan_dir).map_err(|e| CliError(e.to_string()))?;
    plan_store::save_plan(plan_dir, &plan).map_err(|e| CliError(format!("failed to save plan: {e}")))?;

    println!("created plan `{}` ({} task(s)) under {}", plan.id, plan.tasks.len(), project_root.display());
    Ok(())
}

fn most_recent_plan_id(plan_dir: &Path) -> Result<String, CliError> {
    let mut entries: Vec<(std::time::SystemTime, String)> = std::fs::read_dir(plan_dir)
        .map_err(|e| CliError(format!("failed to read `{}`: {e}", plan_dir.display())))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().and_then(|e| e.to_str()) == Some("json"))
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            let id = entry.path().file_stem()?.to_str()?.to_string();
            Some((modified, id))
        })
        .collect();

    entries.sort_by_key(|(modified, _)| *modified);
    entries
        .pop()
        .map(|(_, id)| id)
        .ok_or_else(|| CliError(format!("no plans found under `{}`", plan_dir.display())))
}

async fn run_plan(global: &GlobalOpts, project_root: &Path, plan_dir: &Path, args: RunArgs) -> Result<(), CliError> {
    let plan_id = match args.plan_id {
        Some(id) => id,
        None => most_recent_plan_id(plan_dir)?,
    };

    let mut plan = plan_store::load_plan(plan_dir, &plan_id).map_err(|e| CliError(format!("failed to load plan `{plan_id}`: {e}")))?;

    if let Some(trust) = args.trust {
        plan.config.trust_level = match trust {
            TrustArg::Autonomous => TrustLevel::Autonomous,
            TrustArg::Balanced => TrustLevel::Balanced,
            TrustArg::Conservative => TrustLevel::Conservative,
        };
    }

    let config_path = global.config_file.clone().unwrap_or_else(|| default_cli_config_path(project_root));
    let cli_config = crate::config::load_cli_config(Some(&config_path))?;
    let model_name = args.model.unwrap_or_else(|| cli_config.model.name.clone());
    let api_key = std::env::var(&cli_config.model.api_key_env).unwrap_or_default();
    let model_client = HttpModelClient::new(cli_config.model.api_base.clone(), api_key);

    let tools = LocalToolRegistry::new(project_root.to_path_buf());

    let verbosity = global.verbosity();
    let telemetry: Arc<dyn orchestrator_core::ports::TelemetrySink> = if verbosity == Verbosity::Quiet {
        Arc::new(NullTelemetrySink)
    } else {
        Arc::new(StderrTelemetrySink::new(verbosity))
    };

    // A stable session ID (override via ORCHESTRATOR_SESSION_ID) lets
    // steering notes and the autonomy level survive across invocations;
    // an unset var falls back to a fresh, unpersisted session per run.
    let session_id = std::env::var("ORCHESTRATOR_SESSION_ID").unwrap_or_else(|_| uuid::Uuid::new_v4().to_string());
    let (workflow, progress_rx) = WorkflowController::new(session_id, telemetry, "orchestrator")
        .with_session_store(plan_dir)
        .with_progress_channel(256);

    let drain_handle = tokio::spawn(display::drain_to_stderr(progress_rx, verbosity));

    let ctx = ExecutorContext {
        project_root,
        plan_dir,
        model: &model_client,
        model_name,
        tools: &tools,
        workflow: &workflow,
        batch: None,
        long_run_guard: None,
    };
    let executor = Executor::new(ctx);

    let result = executor.execute(&mut plan).await;

    drop(workflow);
    let _ = drain_handle.await;

    result.map_err(|e| CliError(format!("execution failed: {e}")))?;
    println!("plan `{}` finished", plan.id);
    Ok(())
}

fn show_plan(plan_dir: &Path, args: ShowArgs) -> Result<(), CliError> {
    let plan = plan_store::load_plan(plan_dir, &args.plan_id)
        .map_err(|e| CliError(format!("failed to load plan `{}`: {e}", args.plan_id)))?;

    println!("{}", orchestrator_core::progress_tracker::render_summary_line(&plan));
    println!("{}", orchestrator_core::progress_tracker::render_table(&plan));
    Ok(())
}

fn list_plans(plan_dir: &Path) -> Result<(), CliError> {
    if !plan_dir.exists() {
        println!("no plans found (plan directory `{}` does not exist)", plan_dir.display());
        return Ok(());
    }

    let mut ids: Vec<String> = std::fs::read_dir(plan_dir)
        .map_err(|e| CliError(format!("failed to read `{}`: {e}", plan_dir.display())))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().and_then(|e| e.to_str()) == Some("json"))
        .filter_map(|entry| entry.path().file_stem().and_then(|s| s.to_str()).map(|s| s.to_string()))
        .collect();
    ids.sort();

    if ids.is_empty() {
        println!("no plans found under {}", plan_dir.display());
        return Ok(());
    }

    for id in ids {
        match plan_store::load_plan(plan_dir, &id) {
            Ok(plan) => println!("{id}  {}  ({} task(s))", plan.feature_name, plan.tasks.len()),
            Err(_) => println!("{id}  <unreadable>"),
        }
    }
    Ok(())
}

fn print_completions(shell: clap_complete::Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}
