mod cli;
mod commands;
mod corpus;
mod error;
mod governance;
mod layout;
mod llm;
mod model;
mod semantic;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Extract(args) => commands::extract::run(args),
        Commands::Chunk(args) => commands::chunk::run(args),
        Commands::Embed(args) => commands::embed::run(args),
        Commands::Search(args) => commands::search::run(args),
        Commands::Synth(args) => commands::synth::run(args),
        Commands::Topic(args) => commands::topic::run(args),
        Commands::TopicDraft(args) => commands::topic::run_draft(args),
        Commands::Clean(args) => commands::clean::run(args),
        Commands::Status(args) => commands::status::run(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
