//! Clap argument surface. Thin by design: this module only parses flags
//! and hands structured values to `dispatch`; no orchestration logic
//! lives here.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use orchestrator_core::display::Verbosity;

#[derive(Parser, Debug)]
#[command(name = "orchestrator", version, about = "Autonomous code-change orchestrator")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Increase output verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all but paused/failed progress lines
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,

    /// Project root to operate against (defaults to the current directory)
    #[arg(long = "project", global = true, value_name = "DIR")]
    pub project_root: Option<PathBuf>,

    /// Directory plans are persisted under (defaults to `<project>/.orchestrator/plans`)
    #[arg(long = "plan-dir", global = true, value_name = "DIR")]
    pub plan_dir: Option<PathBuf>,

    /// CLI config file (model endpoint settings)
    #[arg(long = "config", global = true, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Plan-config override file (max_retries, trust_level, ...)
    #[arg(long = "plan-config", global = true, value_name = "FILE")]
    pub plan_config_file: Option<PathBuf>,
}

impl GlobalOpts {
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else if self.verbose > 0 {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize `.orchestrator/` in the project root
    Init,
    /// Create a new plan from a JSON task-spec file
    New(NewArgs),
    /// Execute a plan to completion
    Run(RunArgs),
    /// Show a plan's current status
    Show(ShowArgs),
    /// List plans known to the plan directory
    List,
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Path to a JSON file with `feature_name`, `description`, and `tasks`
    pub spec_file: PathBuf,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum TrustArg {
    Autonomous,
    Balanced,
    Conservative,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Plan ID to execute; defaults to the most recently created plan
    pub plan_id: Option<String>,

    /// Override the configured model name
    #[arg(long)]
    pub model: Option<String>,

    /// Override the plan's configured trust level
    #[arg(long, value_enum)]
    pub trust: Option<TrustArg>,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    pub plan_id: String,
}

#[derive(clap::Args, Debug)]
pub struct CompletionsArgs {
    pub shell: clap_complete::Shell,
}
