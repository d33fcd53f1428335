//! mixgraph CLI - inspect configs and drive mixing graphs on the soft backend.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mixgraph")]
#[command(author, version, about = "mixgraph audio mixing graph CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available effects and their parameters
    Effects(commands::effects::EffectsArgs),

    /// Load and validate a graph configuration
    Check(commands::check::CheckArgs),

    /// Run a graph on the in-memory backend and report its state
    Simulate(commands::simulate::SimulateArgs),
}

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    tracing_log::LogTracer::init().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Effects(args) => commands::effects::run(args),
        Commands::Check(args) => commands::check::run(args),
        Commands::Simulate(args) => commands::simulate::run(args),
    }
}
