pub mod get;
pub mod query;
