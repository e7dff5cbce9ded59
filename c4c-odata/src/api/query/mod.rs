//! OData query construction
//!
//! Two builders live here: the `$filter` expression builder and the query
//! parameter set that renders all system query options into a URL query string.

pub mod filter;
pub mod params;

pub use filter::{FilterAndOr, FilterExpr, FilterField, ODataFilter, new_filter};
pub use params::{
    DEFAULT_TOP, FilterParam, IntoFieldList, ODataQueryParam, ResponseFormat, SortOrder, new_param,
};
