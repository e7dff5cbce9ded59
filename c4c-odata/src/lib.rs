//! OData v2/v4 client core for SAP Cloud for Customer
//!
//! Build filters and query options, hydrate response envelopes into typed
//! entities, and send single or batched requests through a pluggable
//! transport.

pub mod api;
pub mod config;

pub use api::{
    BatchRequest, BatchRequestOptions, BatchResult, CollectionResult, Entity, ODataClient,
    ODataEntity, ODataError, ODataFilter, ODataQueryParam, ODataVersion, SingleResult, new_filter,
    new_param,
};
pub use config::ODataConfig;
