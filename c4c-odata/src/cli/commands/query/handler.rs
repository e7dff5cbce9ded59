//! Query command handler

use anyhow::{Context, Result};
use colored::*;
use std::time::Instant;

use super::QueryCommands;
use crate::cli::output::{render_json, render_table};
use crate::cli::{ConnectionArgs, connect};
use c4c_odata::api::query::{FilterAndOr, FilterParam, ODataQueryParam, SortOrder, new_filter};
use c4c_odata::api::{CollectionResult, Entity};

/// Run a collection query, or only print it with `--dry`
pub async fn handle_query_command(args: QueryCommands, connection: &ConnectionArgs) -> Result<()> {
    let params = build_params(&args)?;
    let query_string = params.to_query_string();

    if args.dry {
        println!("{}?{}", args.collection, query_string);
        return Ok(());
    }

    let client = connect(connection)?;
    let start = Instant::now();

    let result: CollectionResult<Entity> = client
        .query(&args.collection, &params)
        .await
        .with_context(|| format!("Failed to query {}", args.collection))?;

    let elapsed = start.elapsed();

    if args.json {
        println!("{}", render_json(&result.results)?);
        return Ok(());
    }

    println!("{}", render_table(&result.results, &args.select)?);
    println!();

    let mut summary = format!("{} records", result.len());
    if let Some(count) = result.count {
        summary.push_str(&format!(" of {}", count));
    }
    println!(
        "{} {}",
        summary.bright_green(),
        format!("in {:.2}ms", elapsed.as_secs_f64() * 1000.0).dimmed()
    );
    if let Some(next) = &result.next {
        println!("{} {}", "More results:".yellow(), next);
    }

    Ok(())
}

/// Translate command line flags into query options
pub fn build_params(args: &QueryCommands) -> Result<ODataQueryParam> {
    let mut params = ODataQueryParam::new_param();

    if let Some(filter) = build_filter(&args.eq, args.filter.as_deref())? {
        params = params.filter(filter);
    }
    if !args.select.is_empty() {
        params = params.select(args.select.clone());
    }
    if !args.expand.is_empty() {
        params = params.expand(args.expand.clone());
    }
    if let Some(field) = &args.orderby {
        let order = if args.asc { SortOrder::Asc } else { SortOrder::Desc };
        params = params.orderby_with(field, order);
    }
    if let Some(term) = &args.search {
        params = params.search_with(term, !args.exact);
    }
    if let Some(top) = args.top {
        params = params.top(top);
    }
    if let Some(skip) = args.skip {
        params = params.skip(skip);
    }
    if args.count {
        params = params.inlinecount(true);
    }

    Ok(params)
}

/// `--eq` clauses chained with `and`, grouped with a raw `--filter` when both are given
fn build_filter(clauses: &[String], raw: Option<&str>) -> Result<Option<FilterParam>> {
    let mut chain: Option<FilterAndOr> = None;

    for clause in clauses {
        let (field, value) = clause
            .split_once('=')
            .map(|(f, v)| (f.trim(), v.trim()))
            .filter(|(f, v)| !f.is_empty() && !v.is_empty())
            .with_context(|| format!("Invalid --eq clause '{}', expected FIELD=VALUE", clause))?;

        chain = Some(match chain {
            None => new_filter().field(field).eq(value),
            Some(prev) => prev.and().field(field).eq(value),
        });
    }

    let raw = raw.map(str::trim).filter(|r| !r.is_empty());

    Ok(match (chain, raw) {
        (Some(chain), Some(raw)) => Some(chain.and_group(raw).into_filter().into()),
        (Some(chain), None) => Some(chain.into()),
        (None, Some(raw)) => Some(raw.into()),
        (None, None) => None,
    })
}
