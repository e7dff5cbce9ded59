//! Transport seam between the client core and HTTP
//!
//! The core only needs something that takes a resource path, an optional
//! query string, a method and an optional body, and eventually yields the raw
//! response. [`ReqwestTransport`] is the production implementation.

mod http;
#[cfg(test)]
pub(crate) mod mock;

pub use http::ReqwestTransport;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::ODataError;

/// HTTP methods used by OData requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }

    /// Methods that change server state
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Delete | Self::Patch)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Basic auth credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    /// `multipart/mixed` payload of a `$batch` request
    Multipart { boundary: String, payload: String },
}

/// One outbound request
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    /// Path relative to the service root, or an absolute URI
    pub path: String,
    /// Encoded query string without the leading `?`
    pub query: Option<String>,
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl TransportRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: None,
            method,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = (!query.is_empty()).then_some(query);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn with_multipart(
        mut self,
        boundary: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        self.body = Some(RequestBody::Multipart {
            boundary: boundary.into(),
            payload: payload.into(),
        });
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Raw response as received from the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl RawResponse {
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body: body.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON
    ///
    /// An empty body decodes from `null`, so `204 No Content` answers can be
    /// read into `Option`s and default envelopes.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ODataError> {
        let body = self.body.trim();
        if body.is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        serde_json::from_str(body).map_err(|err| {
            if self.is_success() {
                ODataError::Hydration(err)
            } else {
                ODataError::Http {
                    status: self.status,
                    body: self.body.clone(),
                }
            }
        })
    }
}

/// Capability to execute requests against the service
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<RawResponse, ODataError>;

    /// Replace the credential used by later requests, where supported
    fn set_credential(&self, _credential: Credential) -> Result<(), ODataError> {
        Err(ODataError::Config(
            "this transport does not manage credentials".to_string(),
        ))
    }

    /// Point later requests at another service root, where supported
    fn set_endpoint(&self, _endpoint: &str) -> Result<(), ODataError> {
        Err(ODataError::Config(
            "this transport does not manage its endpoint".to_string(),
        ))
    }
}

/// Join a service root and a resource path
///
/// Absolute URIs (as found in `__metadata.uri` and `__deferred.uri`) are used
/// unchanged.
pub fn resolve_url(endpoint: &str, path: &str, query: Option<&str>) -> String {
    let mut url = if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else if path.is_empty() {
        endpoint.to_string()
    } else {
        format!(
            "{}/{}",
            endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    };

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(query);
    }

    url
}
