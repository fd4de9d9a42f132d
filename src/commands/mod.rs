use clap::{Args, Subcommand};
use std::path::PathBuf;

pub type CmdResult<T> = jx::Result<(T, i32)>;

/// Flags shared by every command.
pub(crate) struct GlobalArgs {
    pub batch_mode: bool,
}

impl GlobalArgs {
    pub fn from_cli(batch_mode: bool) -> Self {
        let from_env = std::env::var("JX_BATCH_MODE").is_ok_and(|v| v == "true");
        Self {
            batch_mode: batch_mode || from_env,
        }
    }
}

/// Resolve `--dir`, defaulting to the working directory.
pub(crate) fn resolve_dir(dir: &str) -> jx::Result<PathBuf> {
    let dir = if dir.trim().is_empty() { "." } else { dir };
    let expanded = shellexpand::tilde(dir);
    std::path::absolute(&*expanded)
        .map_err(|e| jx::Error::internal_io(e.to_string(), Some(format!("resolve directory {}", dir))))
}

/// Turn on debug logging for the rest of the process.
pub(crate) fn enable_debug(debug: bool) {
    if debug {
        std::env::set_var("JX_DEBUG", "true");
    }
}

#[derive(Args)]
pub struct CreateArgs {
    #[command(subcommand)]
    command: CreateCommand,
}

#[derive(Subcommand)]
enum CreateCommand {
    /// Create helmfiles from the apps in jx-apps.yml
    Helmfile(helmfile::HelmfileArgs),
}

#[derive(Args)]
pub struct StepArgs {
    #[command(subcommand)]
    command: StepCommand,
}

#[derive(Subcommand)]
enum StepCommand {
    /// Verify the cluster and its git repositories
    Verify(VerifyArgs),
}

#[derive(Args)]
pub struct VerifyArgs {
    #[command(subcommand)]
    command: VerifyCommand,
}

#[derive(Subcommand)]
enum VerifyCommand {
    /// Verify the cluster is ready to boot Jenkins X into
    #[command(visible_aliases = ["pre-install", "pre"])]
    Preinstall(preinstall::PreinstallArgs),
    /// Verify the git repositories of the environments
    #[command(visible_aliases = ["environment", "env"])]
    Environments(environments::EnvironmentsArgs),
}

pub mod environments;
pub mod helmfile;
pub mod preinstall;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(command: crate::Commands, global: &GlobalArgs) -> (jx::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Create(CreateArgs {
            command: CreateCommand::Helmfile(args),
        }) => dispatch!(args, global, helmfile),
        crate::Commands::Step(StepArgs {
            command: StepCommand::Verify(verify),
        }) => match verify.command {
            VerifyCommand::Preinstall(args) => dispatch!(args, global, preinstall),
            VerifyCommand::Environments(args) => dispatch!(args, global, environments),
        },
    }
}
