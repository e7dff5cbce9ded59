//! Batch requests
//!
//! [`new_batch_request`] only describes a sub-request; nothing is sent until
//! [`exec_batch_requests`] packs all of them into one `$batch` call. Results
//! come back in request order, one slot per request. A failing sub-request
//! only fails its own slot; framing problems fail the whole call.

pub mod multipart;

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::api::client::{
    ODataVersion, action_request, entity_path, error_from_response, function_payload,
    function_request,
};
use crate::api::error::ODataError;
use crate::api::models::{
    CollectionResult, Entity, PlainODataResponse, PlainODataResponseV4, SingleResult,
};
use crate::api::query::ODataQueryParam;
use crate::api::transport::{HttpMethod, RawResponse, Transport, TransportRequest};

use self::multipart::PartResponse;

/// What a sub-request does
#[derive(Debug, Clone, PartialEq)]
pub enum BatchRequestOptions {
    /// Read a collection
    Query {
        collection: String,
        params: ODataQueryParam,
    },
    /// Read one entity by key
    Read { collection: String, id: String },
    Create { collection: String, body: Value },
    /// PATCH an entity at its URI
    Update {
        uri: String,
        body: Value,
        etag: Option<String>,
    },
    Delete { uri: String, etag: Option<String> },
    /// Call a function import
    Function {
        name: String,
        parameters: Vec<(String, String)>,
        method: HttpMethod,
    },
    /// Invoke a bound or unbound action
    Action { name: String, body: Value },
}

impl BatchRequestOptions {
    pub fn query(collection: impl Into<String>, params: ODataQueryParam) -> Self {
        Self::Query {
            collection: collection.into(),
            params,
        }
    }

    pub fn read(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Read {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn create(collection: impl Into<String>, body: Value) -> Self {
        Self::Create {
            collection: collection.into(),
            body,
        }
    }

    pub fn update(uri: impl Into<String>, body: Value) -> Self {
        Self::Update {
            uri: uri.into(),
            body,
            etag: None,
        }
    }

    pub fn delete(uri: impl Into<String>) -> Self {
        Self::Delete {
            uri: uri.into(),
            etag: None,
        }
    }

    pub fn function(name: impl Into<String>, parameters: Vec<(String, String)>) -> Self {
        Self::Function {
            name: name.into(),
            parameters,
            method: HttpMethod::Get,
        }
    }

    pub fn action(name: impl Into<String>, body: Value) -> Self {
        Self::Action {
            name: name.into(),
            body,
        }
    }

    /// Attach an `If-Match` etag to an update or delete
    pub fn with_etag(mut self, value: impl Into<String>) -> Self {
        match &mut self {
            Self::Update { etag, .. } | Self::Delete { etag, .. } => *etag = Some(value.into()),
            _ => {}
        }
        self
    }

    fn expected(&self) -> Expected {
        match self {
            Self::Query { .. } => Expected::Collection,
            Self::Read { .. } | Self::Create { .. } => Expected::Single,
            Self::Update { .. } | Self::Delete { .. } => Expected::NoContent,
            Self::Function { .. } | Self::Action { .. } => Expected::Value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expected {
    Collection,
    Single,
    NoContent,
    Value,
}

/// Pending description of one sub-request
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    options: BatchRequestOptions,
}

impl BatchRequest {
    pub fn options(&self) -> &BatchRequestOptions {
        &self.options
    }

    /// The sub-request as it will be framed inside the batch
    pub fn to_transport_request(&self, version: ODataVersion) -> TransportRequest {
        match &self.options {
            BatchRequestOptions::Query { collection, params } => {
                TransportRequest::new(HttpMethod::Get, collection.as_str())
                    .with_query(params.to_query_string())
            }
            BatchRequestOptions::Read { collection, id } => {
                TransportRequest::new(HttpMethod::Get, entity_path(version, collection, id))
            }
            BatchRequestOptions::Create { collection, body } => {
                TransportRequest::new(HttpMethod::Post, collection.as_str()).with_json(body.clone())
            }
            BatchRequestOptions::Update { uri, body, etag } => {
                let request =
                    TransportRequest::new(HttpMethod::Patch, uri.as_str()).with_json(body.clone());
                match etag {
                    Some(etag) => request.with_header("If-Match", etag.as_str()),
                    None => request,
                }
            }
            BatchRequestOptions::Delete { uri, etag } => {
                let request = TransportRequest::new(HttpMethod::Delete, uri.as_str());
                match etag {
                    Some(etag) => request.with_header("If-Match", etag.as_str()),
                    None => request,
                }
            }
            BatchRequestOptions::Function {
                name,
                parameters,
                method,
            } => function_request(version, name, parameters, *method),
            BatchRequestOptions::Action { name, body } => action_request(name, body.clone()),
        }
    }
}

/// Parsed outcome of one sub-request
#[derive(Debug, Clone, PartialEq)]
pub enum BatchResult {
    Collection(CollectionResult<Entity>),
    Single(SingleResult<Entity>),
    NoContent { status: u16 },
    Value(Value),
}

impl BatchResult {
    /// Hydrate a collection slot as `T`
    pub fn into_collection<T: DeserializeOwned>(self) -> Result<CollectionResult<T>, ODataError> {
        match self {
            Self::Collection(result) => result.into_typed(),
            other => Err(ODataError::Batch(format!(
                "expected a collection result, got {}",
                other.kind()
            ))),
        }
    }

    /// Hydrate a single entity slot as `T`
    pub fn into_single<T: DeserializeOwned>(self) -> Result<SingleResult<T>, ODataError> {
        match self {
            Self::Single(result) => result.into_typed(),
            other => Err(ODataError::Batch(format!(
                "expected a single result, got {}",
                other.kind()
            ))),
        }
    }

    pub fn is_no_content(&self) -> bool {
        matches!(self, Self::NoContent { .. })
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Collection(_) => "a collection",
            Self::Single(_) => "a single entity",
            Self::NoContent { .. } => "no content",
            Self::Value(_) => "a raw value",
        }
    }
}

/// Describe one sub-request without sending it
pub fn new_batch_request(options: BatchRequestOptions) -> BatchRequest {
    BatchRequest { options }
}

/// Send all requests as one `$batch` and correlate the responses by position
pub async fn exec_batch_requests(
    transport: &dyn Transport,
    version: ODataVersion,
    requests: Vec<BatchRequest>,
) -> Result<Vec<Result<BatchResult, ODataError>>, ODataError> {
    if requests.is_empty() {
        return Ok(Vec::new());
    }

    let boundary = format!("batch_{}", Uuid::new_v4());
    let sub_requests: Vec<TransportRequest> = requests
        .iter()
        .map(|r| r.to_transport_request(version))
        .collect();
    let payload = multipart::build_payload(&boundary, &sub_requests);

    info!("Executing batch with {} requests", requests.len());

    let response = transport
        .send(TransportRequest::new(HttpMethod::Post, "$batch").with_multipart(&boundary, payload))
        .await?;

    if !response.is_success() {
        return Err(error_from_response(&response));
    }

    let response_boundary = response
        .content_type
        .as_deref()
        .and_then(multipart::boundary_from_content_type)
        .ok_or_else(|| ODataError::Batch("batch response has no multipart boundary".to_string()))?;

    let parts = multipart::parse_response(&response.body, &response_boundary)?;
    if parts.len() != requests.len() {
        return Err(ODataError::Batch(format!(
            "expected {} responses, got {}",
            requests.len(),
            parts.len()
        )));
    }

    debug!("Batch returned {} responses", parts.len());

    Ok(requests
        .iter()
        .zip(parts)
        .map(|(request, part)| interpret(version, request.options.expected(), part))
        .collect())
}

fn interpret(
    version: ODataVersion,
    expected: Expected,
    part: PartResponse,
) -> Result<BatchResult, ODataError> {
    let response = RawResponse {
        status: part.status,
        content_type: part.header("Content-Type").map(str::to_string),
        body: part.body,
    };

    if !response.is_success() {
        return Err(error_from_response(&response));
    }
    if response.body.trim().is_empty() {
        return Ok(BatchResult::NoContent {
            status: response.status,
        });
    }

    match (expected, version) {
        (Expected::Collection, ODataVersion::V2) => Ok(BatchResult::Collection(
            CollectionResult::from_plain_object(response.decode::<PlainODataResponse>()?)?,
        )),
        (Expected::Collection, ODataVersion::V4) => Ok(BatchResult::Collection(
            CollectionResult::from_plain_object_v4(response.decode::<PlainODataResponseV4>()?)?,
        )),
        (Expected::Single, ODataVersion::V2) => Ok(BatchResult::Single(
            SingleResult::from_plain_object(response.decode::<PlainODataResponse>()?)?,
        )),
        (Expected::Single, ODataVersion::V4) => Ok(BatchResult::Single(
            SingleResult::from_plain_object_v4(response.decode::<PlainODataResponseV4>()?)?,
        )),
        (Expected::NoContent | Expected::Value, _) => {
            Ok(BatchResult::Value(function_payload(version, &response)?))
        }
    }
}
