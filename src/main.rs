use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{CreateArgs, GlobalArgs, StepArgs};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "jx")]
#[command(version = VERSION)]
#[command(about = "Boot-time tooling for Jenkins X clusters")]
struct Cli {
    /// Never prompt; take defaults or fail when a value is required
    #[arg(long, global = true)]
    batch_mode: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create resources
    Create(CreateArgs),
    /// Pipeline steps
    Step(StepArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs::from_cli(cli.batch_mode);

    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    if let Err(err) = output::print_json_result(json_result) {
        eprintln!("{}", err.message);
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
