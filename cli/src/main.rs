mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{config, run, stage};
use tracing_subscriber::EnvFilter;

/// Log to stderr; `RUST_LOG` wins over `-v`.
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match &cli.command {
        Commands::Run(args) => run::run(&cli, args),
        Commands::Config(args) => config::run(&cli, args),
        command => {
            let (stage, args) = command.stage().ok_or_else(|| anyhow::anyhow!("[cli] not a stage command"))?;
            stage::run(&cli, stage, args)
        }
    }
}

fn main() -> anyhow::Result<()> { run() }
