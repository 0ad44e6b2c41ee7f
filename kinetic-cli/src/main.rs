//! Kinetic CLI - check and watch video readiness from the command line

mod commands;

use clap::Parser;
use kinetic_core::tracing_setup::{CliLogLevel, init_tracing};
use kinetic_core::{KineticError, RuntimeMode};

#[derive(Parser)]
#[command(name = "kinetic")]
#[command(about = "Video readiness checks for the Kinetic backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,

    /// Console log level (RUST_LOG overrides)
    #[arg(long, value_enum, default_value_t = CliLogLevel::Warn, global = true)]
    log_level: CliLogLevel,

    /// Runtime mode; production requires KINETIC_API_URL
    #[arg(long, global = true)]
    mode: Option<RuntimeMode>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log_level.as_tracing_level(), None) {
        eprintln!("Warning: logging disabled: {e}");
    }

    let mode = cli.mode.unwrap_or_else(RuntimeMode::for_build);
    if let Err(error) = commands::handle_command(cli.command, mode).await {
        tracing::debug!("Command failed: {error:?}");
        match error.downcast_ref::<KineticError>() {
            Some(kinetic) => eprintln!("Error: {}", kinetic.user_message()),
            None => eprintln!("Error: {error:#}"),
        }
        std::process::exit(1);
    }
}
