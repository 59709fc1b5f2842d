mod commands;
mod render;

use anyhow::Result;
use clap::Parser;
use ob_core::config::load_config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::commands::{Command, Workspace};

#[derive(Parser)]
#[command(name = "ob", about = "Review AI suggestions and apply them to the backlog")]
struct Cli {
    /// Project root holding `.openbacklog/`.
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.root)?.with_env(|key| std::env::var(key).ok());

    // Logs go to stderr; stdout carries command output.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let workspace = Workspace::new(config);
    let output = commands::execute(&workspace, cli.command).await?;
    print!("{output}");
    Ok(())
}
