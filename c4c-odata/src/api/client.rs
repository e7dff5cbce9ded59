//! OData client bound to one service root

use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

use super::batch::{self, BatchRequest, BatchRequestOptions, BatchResult};
use super::error::ODataError;
use super::models::{
    CollectionResult, DeferredNavigationProperty, ODataEntity, PlainODataResponse,
    PlainODataResponseV4, ServerErrorBody, SingleResult,
};
use super::query::{FilterField, ODataQueryParam, new_filter, new_param};
use super::transport::{
    Credential, HttpMethod, RawResponse, ReqwestTransport, Transport, TransportRequest,
};
use crate::config::ODataConfig;

/// Protocol version spoken by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ODataVersion {
    #[default]
    V2,
    V4,
}

impl ODataVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V2 => "v2",
            Self::V4 => "v4",
        }
    }
}

impl FromStr for ODataVersion {
    type Err = ODataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "v2" | "2" => Ok(Self::V2),
            "v4" | "4" => Ok(Self::V4),
            other => Err(ODataError::Config(format!(
                "unsupported OData version '{}', expected v2 or v4",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ODataVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry point for talking to an OData service
///
/// Builds requests from the query builders, sends them through a
/// [`Transport`] and parses the envelopes into typed results. Nothing is
/// cached and failed requests are not retried.
#[derive(Clone)]
pub struct ODataClient {
    transport: Arc<dyn Transport>,
    version: ODataVersion,
}

impl ODataClient {
    pub fn new(transport: Arc<dyn Transport>, version: ODataVersion) -> Self {
        Self { transport, version }
    }

    /// Client over HTTP using the given configuration
    pub fn from_config(config: &ODataConfig) -> Result<Self, ODataError> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::new(Arc::new(transport), config.version))
    }

    pub fn version(&self) -> ODataVersion {
        self.version
    }

    pub fn new_filter(&self) -> FilterField {
        new_filter()
    }

    pub fn new_param(&self) -> ODataQueryParam {
        new_param()
    }

    pub fn set_credential(&self, credential: Credential) -> Result<(), ODataError> {
        self.transport.set_credential(credential)
    }

    pub fn set_endpoint(&self, endpoint: &str) -> Result<(), ODataError> {
        self.transport.set_endpoint(endpoint)
    }

    /// Send a request and return the raw response
    pub async fn request_uri(
        &self,
        uri: &str,
        params: Option<&ODataQueryParam>,
        method: HttpMethod,
        body: Option<Value>,
    ) -> Result<RawResponse, ODataError> {
        let mut request = TransportRequest::new(method, uri);
        if let Some(params) = params {
            request = request.with_query(params.to_query_string());
        }
        if let Some(body) = body {
            request = request.with_json(body);
        }
        self.transport.send(request).await
    }

    pub async fn send(&self, request: TransportRequest) -> Result<RawResponse, ODataError> {
        self.transport.send(request).await
    }

    /// Query an entity collection
    pub async fn query<T: DeserializeOwned>(
        &self,
        collection: &str,
        params: &ODataQueryParam,
    ) -> Result<CollectionResult<T>, ODataError> {
        debug!("Querying {} with {}", collection, params);
        let request = TransportRequest::new(HttpMethod::Get, collection)
            .with_query(params.to_query_string());

        match self.version {
            ODataVersion::V2 => CollectionResult::from_request_result(self.envelope(request)).await,
            ODataVersion::V4 => {
                CollectionResult::from_request_result_v4(self.envelope_v4(request)).await
            }
        }
    }

    /// Read one entity by key
    pub async fn get_by_id<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<SingleResult<T>, ODataError> {
        let request =
            TransportRequest::new(HttpMethod::Get, entity_path(self.version, collection, id));
        self.single(request).await
    }

    /// Create an entity and return what the server stored
    pub async fn create<B: Serialize, T: DeserializeOwned>(
        &self,
        collection: &str,
        body: &B,
    ) -> Result<SingleResult<T>, ODataError> {
        let mut request = TransportRequest::new(HttpMethod::Post, collection)
            .with_json(serde_json::to_value(body).map_err(ODataError::Serialization)?);
        if self.version == ODataVersion::V4 {
            request = request.with_header("Prefer", "return=representation");
        }
        self.single(request).await
    }

    /// PATCH an entity back to its `__metadata.uri`
    pub async fn update<E: ODataEntity>(&self, entity: &E) -> Result<(), ODataError> {
        let uri = addressable_uri(entity)?;
        let mut body = serde_json::to_value(entity).map_err(ODataError::Serialization)?;
        if let Value::Object(map) = &mut body {
            map.remove("__metadata");
        }

        let mut request = TransportRequest::new(HttpMethod::Patch, uri).with_json(body);
        if let Some(etag) = entity.etag() {
            request = request.with_header("If-Match", etag);
        }

        let response = self.transport.send(request).await?;
        expect_success(response)
    }

    /// DELETE an entity at its `__metadata.uri`
    pub async fn delete<E: ODataEntity>(&self, entity: &E) -> Result<(), ODataError> {
        let uri = addressable_uri(entity)?;
        let mut request = TransportRequest::new(HttpMethod::Delete, uri);
        if let Some(etag) = entity.etag() {
            request = request.with_header("If-Match", etag);
        }

        let response = self.transport.send(request).await?;
        expect_success(response)
    }

    /// Resolve a deferred to-many navigation property
    pub async fn fetch_deferred<T: DeserializeOwned>(
        &self,
        deferred: &DeferredNavigationProperty,
        params: Option<&ODataQueryParam>,
    ) -> Result<CollectionResult<T>, ODataError> {
        let mut request = TransportRequest::new(HttpMethod::Get, deferred.uri());
        if let Some(params) = params {
            request = request.with_query(params.to_query_string());
        }

        match self.version {
            ODataVersion::V2 => CollectionResult::from_request_result(self.envelope(request)).await,
            ODataVersion::V4 => {
                CollectionResult::from_request_result_v4(self.envelope_v4(request)).await
            }
        }
    }

    /// Resolve a deferred to-one navigation property
    pub async fn fetch_deferred_single<T: DeserializeOwned>(
        &self,
        deferred: &DeferredNavigationProperty,
    ) -> Result<SingleResult<T>, ODataError> {
        self.single(TransportRequest::new(HttpMethod::Get, deferred.uri()))
            .await
    }

    /// Call a function import and return its payload
    ///
    /// Parameters are OData literals, so string values carry their own quotes.
    pub async fn call_function(
        &self,
        name: &str,
        parameters: &[(String, String)],
    ) -> Result<Value, ODataError> {
        let request = function_request(self.version, name, parameters, HttpMethod::Get);
        let response = self.transport.send(request).await?;
        function_payload(self.version, &response)
    }

    /// Invoke an action with a JSON body and return its payload
    pub async fn call_action(&self, name: &str, body: Value) -> Result<Value, ODataError> {
        let response = self.transport.send(action_request(name, body)).await?;
        function_payload(self.version, &response)
    }

    /// Describe one sub-request of a batch
    pub fn new_batch_request(&self, options: BatchRequestOptions) -> BatchRequest {
        batch::new_batch_request(options)
    }

    /// Send requests as one `$batch` and return one result per request, in order
    pub async fn exec_batch_requests(
        &self,
        requests: Vec<BatchRequest>,
    ) -> Result<Vec<Result<BatchResult, ODataError>>, ODataError> {
        batch::exec_batch_requests(self.transport.as_ref(), self.version, requests).await
    }

    async fn single<T: DeserializeOwned>(
        &self,
        request: TransportRequest,
    ) -> Result<SingleResult<T>, ODataError> {
        match self.version {
            ODataVersion::V2 => SingleResult::from_request_result(self.envelope(request)).await,
            ODataVersion::V4 => {
                SingleResult::from_request_result_v4(self.envelope_v4(request)).await
            }
        }
    }

    async fn envelope(&self, request: TransportRequest) -> Result<PlainODataResponse, ODataError> {
        let response = self.transport.send(request).await?;
        let envelope: PlainODataResponse = response.decode()?;
        if !response.is_success() && envelope.error.is_none() {
            return Err(http_error(&response));
        }
        Ok(envelope)
    }

    async fn envelope_v4(
        &self,
        request: TransportRequest,
    ) -> Result<PlainODataResponseV4, ODataError> {
        let response = self.transport.send(request).await?;
        let envelope: PlainODataResponseV4 = response.decode()?;
        if !response.is_success() && envelope.error.is_none() {
            return Err(http_error(&response));
        }
        Ok(envelope)
    }
}

impl std::fmt::Debug for ODataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ODataClient")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// `Collection('key')` in v2, `collection(key)` in v4
pub fn entity_path(version: ODataVersion, collection: &str, id: &str) -> String {
    match version {
        ODataVersion::V2 => format!("{}('{}')", collection, id),
        ODataVersion::V4 => format!("{}({})", collection, id),
    }
}

/// Function import call: query string parameters in v2, `name(args)` in v4
pub fn function_request(
    version: ODataVersion,
    name: &str,
    parameters: &[(String, String)],
    method: HttpMethod,
) -> TransportRequest {
    match version {
        ODataVersion::V2 => {
            let query = parameters
                .iter()
                .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            TransportRequest::new(method, name).with_query(query)
        }
        ODataVersion::V4 => {
            let args = parameters
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(",");
            TransportRequest::new(method, format!("{}({})", name, args))
        }
    }
}

pub fn action_request(name: &str, body: Value) -> TransportRequest {
    TransportRequest::new(HttpMethod::Post, name).with_json(body)
}

/// Payload of a function or action response
///
/// v2 answers are unwrapped from `d` (and `d.results` when present), v4
/// answers are returned as sent. An empty body yields `null`.
pub(crate) fn function_payload(
    version: ODataVersion,
    response: &RawResponse,
) -> Result<Value, ODataError> {
    if !response.is_success() {
        return Err(error_from_response(response));
    }

    let mut payload: Value = response.decode()?;
    if let Some(error) = payload.get("error").filter(|e| e.is_object()) {
        let error: ServerErrorBody = serde_json::from_value(error.clone())?;
        return Err(error.into_error());
    }

    if version == ODataVersion::V2 {
        if let Some(mut d) = payload.get_mut("d").map(Value::take) {
            payload = match d.get_mut("results").map(Value::take) {
                Some(results) => results,
                None => d,
            };
        }
    }
    Ok(payload)
}

fn addressable_uri<E: ODataEntity>(entity: &E) -> Result<String, ODataError> {
    entity.uri().map(str::to_string).ok_or_else(|| {
        ODataError::MalformedEnvelope("entity has no `__metadata.uri`".to_string())
    })
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ServerErrorBody>,
}

/// Turn a non-success response into the most specific error available
pub(crate) fn error_from_response(response: &RawResponse) -> ODataError {
    match serde_json::from_str::<ErrorEnvelope>(&response.body) {
        Ok(ErrorEnvelope { error: Some(error) }) => error.into_error(),
        _ => http_error(response),
    }
}

fn http_error(response: &RawResponse) -> ODataError {
    ODataError::Http {
        status: response.status,
        body: response.body.clone(),
    }
}

fn expect_success(response: RawResponse) -> Result<(), ODataError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(error_from_response(&response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{Entity, EntityMetadata};
    use crate::api::transport::mock::MockTransport;
    use serde_json::json;

    fn client(transport: &Arc<MockTransport>, version: ODataVersion) -> ODataClient {
        ODataClient::new(transport.clone(), version)
    }

    #[test]
    fn test_version_parsing() {
        assert_eq!("v4".parse::<ODataVersion>().unwrap(), ODataVersion::V4);
        assert_eq!("V2".parse::<ODataVersion>().unwrap(), ODataVersion::V2);
        assert!("v3".parse::<ODataVersion>().is_err());
    }

    #[tokio::test]
    async fn test_query_sends_params_and_hydrates() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(
            200,
            json!({ "d": { "results": [{ "ObjectID": "1" }, { "ObjectID": "2" }] } }),
        );
        let client = client(&transport, ODataVersion::V2);

        let params = client
            .new_param()
            .filter(client.new_filter().field("RoleCode").eq("'CRM000'"))
            .top(2);
        let result = client
            .query::<Entity>("AccountCollection", &params)
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.results[1].object_id.as_deref(), Some("2"));

        let request = transport.last_request();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.path, "AccountCollection");
        assert_eq!(
            request.query.as_deref(),
            Some("$filter=RoleCode%20eq%20%27CRM000%27&$format=json&$top=2")
        );
    }

    #[tokio::test]
    async fn test_query_surfaces_server_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(
            400,
            json!({
                "error": {
                    "code": "400",
                    "message": { "lang": "en", "value": "Bad Request" }
                }
            }),
        );
        let client = client(&transport, ODataVersion::V2);

        let err = client
            .query::<Entity>("AccountCollection", &new_param())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Bad Request");
        assert_eq!(err.code(), Some("400"));
    }

    #[tokio::test]
    async fn test_non_json_failure_is_http_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push(RawResponse {
            status: 401,
            content_type: Some("text/html".to_string()),
            body: "Unauthorized".to_string(),
        });
        let client = client(&transport, ODataVersion::V2);

        let err = client
            .get_by_id::<Entity>("AccountCollection", "1")
            .await
            .unwrap_err();
        assert!(matches!(err, ODataError::Http { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let transport = Arc::new(MockTransport::new());
        transport.push_failure("connection refused");
        let client = client(&transport, ODataVersion::V2);

        let err = client
            .query::<Entity>("AccountCollection", &new_param())
            .await
            .unwrap_err();
        assert!(matches!(err, ODataError::Transport(_)));
        assert_eq!(err.to_string(), "connection refused");
    }

    #[tokio::test]
    async fn test_get_by_id_paths() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, json!({ "d": { "results": { "ObjectID": "00163E" } } }));
        let result = client(&transport, ODataVersion::V2)
            .get_by_id::<Entity>("AccountCollection", "00163E")
            .await
            .unwrap();
        assert_eq!(result.result.object_id.as_deref(), Some("00163E"));
        assert_eq!(transport.last_request().path, "AccountCollection('00163E')");

        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, json!({ "accountid": "a1", "name": "Acme" }));
        let result = client(&transport, ODataVersion::V4)
            .get_by_id::<Entity>("accounts", "a1")
            .await
            .unwrap();
        assert_eq!(result.result.get_str("name"), Some("Acme"));
        assert_eq!(transport.last_request().path, "accounts(a1)");
    }

    #[tokio::test]
    async fn test_create_posts_body() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(
            201,
            json!({ "d": { "results": { "ObjectID": "new", "Name": "Acme" } } }),
        );
        let client = client(&transport, ODataVersion::V2);

        let created = client
            .create::<_, Entity>("AccountCollection", &json!({ "Name": "Acme" }))
            .await
            .unwrap();
        assert_eq!(created.result.object_id.as_deref(), Some("new"));

        let request = transport.last_request();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(
            request.body,
            Some(crate::api::transport::RequestBody::Json(json!({ "Name": "Acme" })))
        );
        assert_eq!(request.header("Prefer"), None);
    }

    #[tokio::test]
    async fn test_update_patches_metadata_uri_with_etag() {
        let transport = Arc::new(MockTransport::new());
        transport.push(RawResponse {
            status: 204,
            content_type: None,
            body: String::new(),
        });
        let client = client(&transport, ODataVersion::V2);

        let mut entity = Entity {
            metadata: Some(EntityMetadata {
                uri: "https://host/odata/AccountCollection('1')".to_string(),
                entity_type: "c4codata.Account".to_string(),
                etag: Some("W/\"1\"".to_string()),
            }),
            object_id: Some("1".to_string()),
            ..Default::default()
        };
        entity.set("Name", "Renamed");

        client.update(&entity).await.unwrap();

        let request = transport.last_request();
        assert_eq!(request.method, HttpMethod::Patch);
        assert_eq!(request.path, "https://host/odata/AccountCollection('1')");
        assert_eq!(request.header("If-Match"), Some("W/\"1\""));
        assert_eq!(
            request.body,
            Some(crate::api::transport::RequestBody::Json(
                json!({ "ObjectID": "1", "Name": "Renamed" })
            ))
        );
    }

    #[tokio::test]
    async fn test_delete_reports_server_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(
            412,
            json!({
                "error": {
                    "code": "412",
                    "message": { "lang": "en", "value": "Precondition failed" }
                }
            }),
        );
        let client = client(&transport, ODataVersion::V2);

        let entity = Entity {
            metadata: Some(EntityMetadata {
                uri: "AccountCollection('1')".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };

        let err = client.delete(&entity).await.unwrap_err();
        assert_eq!(err.to_string(), "Precondition failed");
        assert_eq!(transport.last_request().method, HttpMethod::Delete);
    }

    #[tokio::test]
    async fn test_update_requires_uri() {
        let transport = Arc::new(MockTransport::new());
        let client = client(&transport, ODataVersion::V2);

        let err = client.update(&Entity::default()).await.unwrap_err();
        assert!(matches!(err, ODataError::MalformedEnvelope(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_deferred() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, json!({ "d": { "results": [{ "ObjectID": "c1" }] } }));
        let client = client(&transport, ODataVersion::V2);

        let deferred =
            DeferredNavigationProperty::new("https://host/odata/AccountCollection('1')/Contacts");
        let contacts = client
            .fetch_deferred::<Entity>(&deferred, Some(&new_param().top(5)))
            .await
            .unwrap();

        assert_eq!(contacts.results[0].object_id.as_deref(), Some("c1"));
        let request = transport.last_request();
        assert_eq!(request.path, deferred.uri());
        assert_eq!(request.query.as_deref(), Some("$format=json&$top=5"));
    }

    #[tokio::test]
    async fn test_set_credential_unsupported_by_mock() {
        let transport = Arc::new(MockTransport::new());
        let client = client(&transport, ODataVersion::V2);
        assert!(client.set_credential(Credential::new("u", "p")).is_err());
    }

    #[tokio::test]
    async fn test_call_function_v2_unwraps_results() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, json!({ "d": { "results": [{ "ObjectID": "1" }] } }));
        let client = client(&transport, ODataVersion::V2);

        let payload = client
            .call_function("GetOpenLeads", &[("Owner".to_string(), "'Jane Doe'".to_string())])
            .await
            .unwrap();
        assert_eq!(payload, json!([{ "ObjectID": "1" }]));

        let request = transport.last_request();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.path, "GetOpenLeads");
        assert_eq!(request.query.as_deref(), Some("Owner=%27Jane%20Doe%27"));
    }

    #[tokio::test]
    async fn test_call_function_v4_renders_arguments_in_path() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, json!({ "@odata.context": "$metadata#Edm.Int32", "value": 3 }));
        let client = client(&transport, ODataVersion::V4);

        let payload = client
            .call_function(
                "CountLeads",
                &[
                    ("Owner".to_string(), "'jane'".to_string()),
                    ("Open".to_string(), "true".to_string()),
                ],
            )
            .await
            .unwrap();
        assert_eq!(payload["value"], json!(3));

        let request = transport.last_request();
        assert_eq!(request.path, "CountLeads(Owner='jane',Open=true)");
        assert_eq!(request.query, None);
    }

    #[tokio::test]
    async fn test_call_action_posts_body() {
        let transport = Arc::new(MockTransport::new());
        transport.push(RawResponse {
            status: 204,
            content_type: None,
            body: String::new(),
        });
        let client = client(&transport, ODataVersion::V4);

        let payload = client
            .call_action("accounts(1)/Microsoft.Dynamics.CRM.Merge", json!({ "Target": 2 }))
            .await
            .unwrap();
        assert_eq!(payload, Value::Null);

        let request = transport.last_request();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(
            request.body,
            Some(crate::api::transport::RequestBody::Json(json!({ "Target": 2 })))
        );
    }

    #[tokio::test]
    async fn test_call_action_surfaces_server_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(
            400,
            json!({
                "error": {
                    "code": "400",
                    "message": { "lang": "en", "value": "Invalid input" }
                }
            }),
        );
        let client = client(&transport, ODataVersion::V2);

        let err = client.call_action("ReleaseLead", json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid input");
    }

    #[tokio::test]
    async fn test_unserializable_body_is_not_a_hydration_error() {
        use std::collections::BTreeMap;

        let transport = Arc::new(MockTransport::new());
        let client = client(&transport, ODataVersion::V2);

        let mut body = BTreeMap::new();
        body.insert(vec![1u8], "non-string key");

        let err = client
            .create::<_, Entity>("AccountCollection", &body)
            .await
            .unwrap_err();
        assert!(matches!(err, ODataError::Serialization(_)));
        assert!(err.to_string().starts_with("failed to serialize request body"));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_request_uri_returns_raw_response() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, json!({ "d": { "results": [] } }));
        let client = client(&transport, ODataVersion::V2);

        let response = client
            .request_uri("ContactCollection", Some(&new_param()), HttpMethod::Get, None)
            .await
            .unwrap();

        assert!(response.is_success());
        assert_eq!(transport.last_request().query.as_deref(), Some("$format=json&$top=30"));
    }
}
