//! reqwest backed transport

use arc_swap::{ArcSwap, ArcSwapOption};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use std::sync::Arc;
use std::time::Instant;

use super::{
    Credential, HttpMethod, RawResponse, RequestBody, Transport, TransportRequest, resolve_url,
};
use crate::api::error::ODataError;
use crate::config::ODataConfig;

const CSRF_HEADER: &str = "x-csrf-token";

/// Endpoint and credential, swappable while requests are in flight
#[derive(Debug, Clone)]
struct Connection {
    endpoint: String,
    credential: Option<Credential>,
}

/// HTTP transport for SAP C4C style OData services
///
/// Sends basic auth when a credential is set and fetches an `x-csrf-token`
/// before the first write request. Non-success statuses are handed back as
/// responses so the envelope parser can report the server's message.
pub struct ReqwestTransport {
    http: reqwest::Client,
    connection: ArcSwap<Connection>,
    csrf_token: ArcSwapOption<String>,
    csrf: bool,
}

impl ReqwestTransport {
    pub fn new(config: &ODataConfig) -> Result<Self, ODataError> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            http,
            connection: ArcSwap::from_pointee(Connection {
                endpoint: config.endpoint.clone(),
                credential: config.credential(),
            }),
            csrf_token: ArcSwapOption::empty(),
            csrf: config.csrf,
        })
    }

    pub fn endpoint(&self) -> String {
        self.connection.load().endpoint.clone()
    }

    fn apply_auth(
        &self,
        builder: reqwest::RequestBuilder,
        connection: &Connection,
    ) -> reqwest::RequestBuilder {
        match &connection.credential {
            Some(credential) => {
                builder.basic_auth(&credential.username, Some(&credential.password))
            }
            None => builder,
        }
    }

    async fn csrf_token(&self, connection: &Connection) -> Result<Option<String>, ODataError> {
        if let Some(token) = self.csrf_token.load_full() {
            return Ok(Some(token.as_ref().clone()));
        }

        debug!("Fetching CSRF token from {}", connection.endpoint);
        let response = self
            .apply_auth(self.http.get(&connection.endpoint), connection)
            .header(CSRF_HEADER, "Fetch")
            .send()
            .await?;

        let token = response
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match &token {
            Some(token) => self.csrf_token.store(Some(Arc::new(token.clone()))),
            None => warn!(
                "Service did not return a CSRF token (HTTP {})",
                response.status().as_u16()
            ),
        }

        Ok(token)
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("endpoint", &self.connection.load().endpoint)
            .field("csrf", &self.csrf)
            .finish()
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<RawResponse, ODataError> {
        let connection = self.connection.load_full();
        let url = resolve_url(&connection.endpoint, &request.path, request.query.as_deref());
        let start = Instant::now();

        debug!("{} {}", request.method, url);

        let mut builder = self.apply_auth(
            self.http.request(to_reqwest_method(request.method), &url),
            &connection,
        );

        // $batch is always POSTed, even when it only carries reads
        if self.csrf && request.method.is_write() {
            if let Some(token) = self.csrf_token(&connection).await? {
                builder = builder.header(CSRF_HEADER, token);
            }
        }

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.body {
            Some(RequestBody::Json(body)) => builder.json(&body),
            Some(RequestBody::Multipart { boundary, payload }) => builder
                .header(CONTENT_TYPE, format!("multipart/mixed; boundary={}", boundary))
                .body(payload),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        debug!(
            "{} {} -> {} in {:.2}ms",
            request.method,
            url,
            status,
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }

    fn set_credential(&self, credential: Credential) -> Result<(), ODataError> {
        let current = self.connection.load();
        self.connection.store(Arc::new(Connection {
            endpoint: current.endpoint.clone(),
            credential: Some(credential),
        }));
        self.csrf_token.store(None);
        Ok(())
    }

    fn set_endpoint(&self, endpoint: &str) -> Result<(), ODataError> {
        let current = self.connection.load();
        self.connection.store(Arc::new(Connection {
            endpoint: endpoint.to_string(),
            credential: current.credential.clone(),
        }));
        self.csrf_token.store(None);
        Ok(())
    }
}
