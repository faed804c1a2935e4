//! hostlink CLI: drive the pipeline session lifecycle from a headless host.
//!
//! Replays scripted host lifecycle events against the transition
//! controller, resolves artifact paths to contexts, and manages the user
//! config file.

mod commands;
mod host;
mod script;
mod simulate;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
