//! `brokerchain` binary: runs the pipeline passes against a store file.
//!
//! Results go to stdout as JSON; logs go to stderr.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Cli;

fn init_tracing(json: bool) {
    let text = (!json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));
    let json = json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    tracing_subscriber::registry()
        .with(text)
        .with(json)
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    tracing::debug!("brokerchain v{}", env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(commands::execute(cli))?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
