use std::process::ExitCode;

use clap::Parser;
use user_store::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    cli::run(cli).await
}
