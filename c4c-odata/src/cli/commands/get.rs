//! `get` command: read entities by key

use anyhow::{Result, bail};
use clap::Args;
use colored::*;
use futures::future::join_all;

use crate::cli::output::{render_json, render_table};
use crate::cli::{ConnectionArgs, connect};
use c4c_odata::api::Entity;

#[derive(Args, Debug, Clone)]
pub struct GetCommands {
    /// Entity collection, e.g. AccountCollection
    pub collection: String,

    /// One or more keys; several keys are fetched concurrently
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Print results as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub async fn handle_get_command(args: GetCommands, connection: &ConnectionArgs) -> Result<()> {
    let client = connect(connection)?;

    let pending = args
        .ids
        .iter()
        .map(|id| client.get_by_id::<Entity>(&args.collection, id));
    let results = join_all(pending).await;

    let mut found = Vec::new();
    let mut failed = 0;
    for (id, result) in args.ids.iter().zip(results) {
        match result {
            Ok(single) => found.push(single.into_inner()),
            Err(err) => {
                failed += 1;
                eprintln!("{} {}: {}", "Failed".bright_red(), id, err);
            }
        }
    }

    if !found.is_empty() {
        let output = if args.json {
            render_json(&found)?
        } else {
            render_table(&found, &[])?
        };
        println!("{}", output);
    }

    if failed > 0 {
        bail!("{} of {} lookups failed", failed, args.ids.len());
    }
    Ok(())
}
