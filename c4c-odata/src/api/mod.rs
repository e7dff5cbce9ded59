//! OData v2/v4 client core for SAP Cloud for Customer style services
//!
//! The pieces build on each other: `query` renders filters and system query
//! options, `transport` moves bytes, `models` turns envelopes into typed
//! entities and `client` ties them to one service root. `batch` packs many
//! requests into a single `$batch` call.

pub mod batch;
pub mod client;
pub mod error;
pub mod models;
pub mod query;
pub mod transport;

pub use batch::{BatchRequest, BatchRequestOptions, BatchResult};
pub use client::{ODataClient, ODataVersion, action_request, entity_path, function_request};
pub use error::ODataError;
pub use models::{
    CollectionResult, DeferredNavigationProperty, Entity, EntityMetadata, NavigationProperty,
    ODataEntity, PlainODataResponse, PlainODataResponseV4, SingleResult,
};
pub use query::{FilterField, ODataFilter, ODataQueryParam, new_filter, new_param};
pub use transport::{
    Credential, HttpMethod, RawResponse, ReqwestTransport, Transport, TransportRequest,
};
