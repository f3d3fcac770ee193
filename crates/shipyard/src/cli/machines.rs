//! the `machines` subcommand - manage machine records

use clap::{Args, Subcommand};
use color_eyre::eyre::{Context, Result, bail};
use shipyard_db::Database;
use shipyard_types::{Machine, MachineId};

use super::ConfigArgs;

/// manage machines
#[derive(Subcommand, Debug)]
pub enum MachinesCommand {
    /// register a new machine in `pending` state
    Create(CreateMachineArgs),

    /// list all machines
    List(ListMachinesArgs),

    /// show one machine, including its build log
    Show(ShowMachineArgs),
}

/// register a new machine
#[derive(Args, Debug)]
pub struct CreateMachineArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// machine id
    id: MachineId,

    /// display name (defaults to the id)
    #[arg(long)]
    name: Option<String>,
}

/// list machines
#[derive(Args, Debug)]
pub struct ListMachinesArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// output format (table, json)
    #[arg(short, long, default_value = "table")]
    output: String,
}

/// show a machine
#[derive(Args, Debug)]
pub struct ShowMachineArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// machine id
    id: MachineId,

    /// output format (table, json)
    #[arg(short, long, default_value = "table")]
    output: String,
}

impl MachinesCommand {
    /// run the machines command
    pub async fn run(self) -> Result<()> {
        match self {
            MachinesCommand::Create(args) => create_machine(args).await,
            MachinesCommand::List(args) => list_machines(args).await,
            MachinesCommand::Show(args) => show_machine(args).await,
        }
    }
}

async fn create_machine(args: CreateMachineArgs) -> Result<()> {
    let (_, db) = args.config.connect().await?;

    if db
        .get_machine(&args.id)
        .await
        .context("failed to check for existing machine")?
        .is_some()
    {
        bail!("machine '{}' already exists", args.id);
    }

    let name = args.name.unwrap_or_else(|| args.id.to_string());
    let created = db
        .create_machine(&Machine::new(args.id, name))
        .await
        .context("failed to create machine")?;

    println!("Created machine:");
    println!("  ID:     {}", created.id);
    println!("  Name:   {}", created.name);
    println!("  Status: {}", created.status);

    Ok(())
}

async fn list_machines(args: ListMachinesArgs) -> Result<()> {
    let (_, db) = args.config.connect().await?;

    let machines = db
        .list_machines()
        .await
        .context("failed to list machines")?;

    if args.output == "json" {
        println!("{}", serde_json::to_string_pretty(&machines)?);
        return Ok(());
    }

    if machines.is_empty() {
        println!("No machines found.");
        return Ok(());
    }

    println!(
        "{:<24} {:<20} {:<10} {:<30}",
        "ID", "NAME", "STATUS", "ENDPOINT"
    );
    println!("{}", "-".repeat(87));

    for machine in machines {
        println!(
            "{:<24} {:<20} {:<10} {:<30}",
            machine.id,
            machine.name,
            machine.status,
            machine.endpoint.as_deref().unwrap_or("-"),
        );
    }

    Ok(())
}

async fn show_machine(args: ShowMachineArgs) -> Result<()> {
    let (_, db) = args.config.connect().await?;

    let Some(machine) = db
        .get_machine(&args.id)
        .await
        .context("failed to query machine")?
    else {
        bail!("machine '{}' not found", args.id);
    };

    if args.output == "json" {
        println!("{}", serde_json::to_string_pretty(&machine)?);
        return Ok(());
    }

    println!("ID:         {}", machine.id);
    println!("Name:       {}", machine.name);
    println!("Status:     {}", machine.status);
    println!(
        "Endpoint:   {}",
        machine.endpoint.as_deref().unwrap_or("-")
    );
    println!("Created:    {}", machine.created_at.to_rfc3339());
    if let Some(build_log) = &machine.build_log {
        println!("Build log:");
        for line in build_log.lines() {
            println!("  {}", line);
        }
    }

    Ok(())
}
