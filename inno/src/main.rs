use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    match cli.command {
        cli::Commands::Probe(args) => commands::probe::run(args),
        cli::Commands::Info(args) => commands::info::run(args),
    }
}
