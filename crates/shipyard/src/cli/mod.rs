//! cli subcommands for shipyard.
//!
//! - `shipyard serve` - run the callback server
//! - `shipyard machines create|list|show` - manage machine records
//! - `shipyard tokens mint` - mint a callback token for a machine

mod config;
mod machines;
mod serve;
mod tokens;

pub use config::{ConfigArgs, apply_legacy_env_fallback};
pub use machines::MachinesCommand;
pub use serve::ServeCommand;
pub use tokens::TokensCommand;

use clap::{Parser, Subcommand};

/// shipyard - build callback server for provisioned machines
#[derive(Parser, Debug)]
#[command(name = "shipyard")]
#[command(about = "Build callback server for provisioned machines", long_about = None)]
#[command(version)]
pub struct Cli {
    /// subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// top-level commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// run the callback server
    Serve(ServeCommand),

    /// manage machines
    #[command(subcommand)]
    Machines(MachinesCommand),

    /// mint callback tokens
    #[command(subcommand)]
    Tokens(TokensCommand),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_tokens_mint() {
        let cli = Cli::try_parse_from([
            "shipyard",
            "tokens",
            "mint",
            "m1",
            "--endpoint",
            "http://10.0.0.5:8000",
            "--no-check",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Tokens(TokensCommand::Mint(_))));
    }

    #[test]
    fn test_empty_machine_id_is_rejected() {
        assert!(Cli::try_parse_from(["shipyard", "machines", "show", ""]).is_err());
    }
}
