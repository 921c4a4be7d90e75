use anyhow::Result;
use clap::Parser;

mod anchors;
mod cli;
mod config;
mod discover;
mod document;
mod engine;
mod error;
mod groups;
mod ids;
mod util;
mod validate;
mod workflow;

use cli::{Command, RootArgs};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = RootArgs::parse();
    match args.command {
        Command::Init(args) => workflow::run_init(args),
        Command::Scan(args) => workflow::run_scan(args),
        Command::Apply(args) => workflow::run_apply(args),
        Command::Check(args) => workflow::run_check(args),
    }
}
