//! shipyard - build callback server for provisioned machines

use clap::Parser;
use color_eyre::eyre::Result;
use shipyard::cli::{Cli, Command, apply_legacy_env_fallback};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    apply_legacy_env_fallback();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(cmd) => cmd.run().await,
        Command::Machines(cmd) => cmd.run().await,
        Command::Tokens(cmd) => cmd.run().await,
    }
}
