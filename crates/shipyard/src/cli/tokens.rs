//! the `tokens` subcommand - mint machine callback tokens

use chrono::Utc;
use clap::{Args, Subcommand};
use color_eyre::eyre::{Context, Result, bail};
use shipyard_db::Database;
use shipyard_types::MachineId;

use super::ConfigArgs;
use crate::token::mint_machine_token;

/// manage machine callback tokens
#[derive(Subcommand, Debug)]
pub enum TokensCommand {
    /// mint a callback token for a machine
    Mint(MintTokenArgs),
}

/// mint a callback token
#[derive(Args, Debug)]
pub struct MintTokenArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// machine the token may report for
    machine_id: MachineId,

    /// endpoint to embed in the token
    #[arg(long)]
    endpoint: Option<String>,

    /// skip checking that the machine exists
    #[arg(long, default_value_t = false)]
    no_check: bool,
}

impl TokensCommand {
    /// run the tokens command
    pub async fn run(self) -> Result<()> {
        match self {
            TokensCommand::Mint(args) => mint_token(args).await,
        }
    }
}

async fn mint_token(args: MintTokenArgs) -> Result<()> {
    let config = if args.no_check {
        args.config.load()?
    } else {
        let (config, db) = args.config.connect().await?;
        if db
            .get_machine(&args.machine_id)
            .await
            .context("failed to query machine")?
            .is_none()
        {
            bail!(
                "machine '{}' not found (use --no-check to mint anyway)",
                args.machine_id
            );
        }
        config
    };

    let minted = mint_machine_token(
        &config.token,
        &args.machine_id,
        args.endpoint.as_deref(),
        Utc::now(),
    )
    .context("failed to mint token")?;

    eprintln!(
        "Token for machine '{}' expires {}",
        args.machine_id,
        minted.expires_at.to_rfc3339()
    );
    println!("{}", minted.token);

    Ok(())
}
