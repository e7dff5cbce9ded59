use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;

mod cli;

use cli::ConnectionArgs;
use cli::commands::get::{GetCommands, handle_get_command};
use cli::commands::query::{QueryCommands, handle_query_command};

#[derive(Parser)]
#[command(name = "c4c-odata")]
#[command(about = "Query SAP Cloud for Customer OData services")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a collection with filters and query options
    Query(QueryCommands),
    /// Read entities by key
    Get(GetCommands),
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(err) = run().await {
        eprintln!("{} {:#}", "Error:".bright_red().bold(), err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Query(args) => handle_query_command(args, &cli.connection).await,
        Commands::Get(args) => handle_get_command(args, &cli.connection).await,
    }
}
