//! `query` command arguments

mod handler;

pub use handler::handle_query_command;

use clap::Args;

#[derive(Args, Debug, Clone, Default)]
pub struct QueryCommands {
    /// Entity collection, e.g. AccountCollection
    pub collection: String,

    /// Raw $filter expression
    #[arg(long)]
    pub filter: Option<String>,

    /// Equality clause FIELD=VALUE, repeatable and joined with `and`.
    /// VALUE is an OData literal, quote strings: Name='Acme'
    #[arg(long = "eq", value_name = "FIELD=VALUE")]
    pub eq: Vec<String>,

    /// Comma separated fields for $select
    #[arg(long, value_delimiter = ',')]
    pub select: Vec<String>,

    /// Comma separated navigation properties for $expand
    #[arg(long, value_delimiter = ',')]
    pub expand: Vec<String>,

    /// Field for $orderby, descending unless --asc is given
    #[arg(long)]
    pub orderby: Option<String>,

    /// Sort ascending
    #[arg(long, requires = "orderby")]
    pub asc: bool,

    /// Full text search term, wrapped in % unless --exact is given
    #[arg(long)]
    pub search: Option<String>,

    /// Send the search term as is
    #[arg(long, requires = "search")]
    pub exact: bool,

    /// Maximum number of records
    #[arg(long)]
    pub top: Option<u32>,

    /// Number of records to skip
    #[arg(long)]
    pub skip: Option<u32>,

    /// Request the total count ($inlinecount=allpages)
    #[arg(long)]
    pub count: bool,

    /// Print the request URL path and query string without sending it
    #[arg(long)]
    pub dry: bool,

    /// Print results as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}
