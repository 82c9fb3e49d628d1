use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "inno",
    about = "Inspect Inno Setup installer archives.",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Check whether a file looks like an Inno Setup installer")]
    Probe(ProbeArgs),

    #[command(about = "Show the installer's embedded region offsets")]
    Info(InfoArgs),
}

#[derive(Debug, clap::Args)]
pub struct ProbeArgs {
    /// Path to the installer executable
    pub file: PathBuf,

    /// Only set the exit code, print nothing
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, clap::Args)]
pub struct InfoArgs {
    /// Path to the installer executable
    pub file: PathBuf,
}
