//! Typed single and collection results
//!
//! Both parsers check the envelope's `error` block first and fail with the
//! server's message. Otherwise they hydrate the payload into the requested
//! type. A collection either hydrates completely or not at all.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::hydrate::from_plain_object;
use super::response::{PlainODataResponse, PlainODataResponseV4, normalize_v4_entity};
use crate::api::error::ODataError;

/// Result of a request that yields exactly one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleResult<T> {
    pub result: T,
}

impl<T: DeserializeOwned> SingleResult<T> {
    /// Parse a v2 envelope, hydrating `d.results` as one `T`
    pub fn from_plain_object(envelope: PlainODataResponse) -> Result<Self, ODataError> {
        let results = envelope.into_data()?.results.ok_or_else(|| {
            ODataError::MalformedEnvelope("missing `d.results`".to_string())
        })?;
        Ok(Self {
            result: from_plain_object(results)?,
        })
    }

    /// Parse a v4 envelope, hydrating the top level object as one `T`
    pub fn from_plain_object_v4(mut envelope: PlainODataResponseV4) -> Result<Self, ODataError> {
        envelope.check_error()?;
        let mut properties = envelope.properties;
        if let Some(value) = envelope.value {
            properties.insert("value".to_string(), value);
        }
        let raw = normalize_v4_entity(Value::Object(properties));
        Ok(Self {
            result: from_plain_object(raw)?,
        })
    }

    /// Await a pending envelope and parse it
    pub async fn from_request_result<F, E>(pending: F) -> Result<Self, E>
    where
        F: Future<Output = Result<PlainODataResponse, E>>,
        E: From<ODataError>,
    {
        let envelope = pending.await?;
        Self::from_plain_object(envelope).map_err(E::from)
    }

    pub async fn from_request_result_v4<F, E>(pending: F) -> Result<Self, E>
    where
        F: Future<Output = Result<PlainODataResponseV4, E>>,
        E: From<ODataError>,
    {
        let envelope = pending.await?;
        Self::from_plain_object_v4(envelope).map_err(E::from)
    }
}

impl<T> SingleResult<T> {
    pub fn into_inner(self) -> T {
        self.result
    }

    /// Re-hydrate the result as another type
    pub fn into_typed<U: DeserializeOwned>(self) -> Result<SingleResult<U>, ODataError>
    where
        T: Serialize,
    {
        Ok(SingleResult {
            result: serde_json::from_value(serde_json::to_value(self.result)?)?,
        })
    }
}

/// Result of a request that yields an ordered list of entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionResult<T> {
    pub results: Vec<T>,
    /// Total count reported by the server, if it was requested
    pub count: Option<u64>,
    /// Link to the next page, if the server paged the result
    pub next: Option<String>,
}

impl<T> Default for CollectionResult<T> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            count: None,
            next: None,
        }
    }
}

impl<T: DeserializeOwned> CollectionResult<T> {
    /// Parse a v2 envelope, hydrating every element of `d.results` in order
    pub fn from_plain_object(envelope: PlainODataResponse) -> Result<Self, ODataError> {
        let data = envelope.into_data()?;
        let items = match data.results {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(ODataError::MalformedEnvelope(format!(
                    "expected `d.results` to be an array, got {}",
                    json_kind(&other)
                )));
            }
            None => {
                return Err(ODataError::MalformedEnvelope(
                    "missing `d.results`".to_string(),
                ));
            }
        };

        Ok(Self {
            results: hydrate_all(items)?,
            count: data.count,
            next: data.next,
        })
    }

    /// Parse a v4 envelope, hydrating every element of `value` in order
    pub fn from_plain_object_v4(mut envelope: PlainODataResponseV4) -> Result<Self, ODataError> {
        envelope.check_error()?;
        let items = match envelope.value {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(ODataError::MalformedEnvelope(format!(
                    "expected `value` to be an array, got {}",
                    json_kind(&other)
                )));
            }
            None => {
                return Err(ODataError::MalformedEnvelope("missing `value`".to_string()));
            }
        };

        Ok(Self {
            results: hydrate_all(items.into_iter().map(normalize_v4_entity).collect())?,
            count: envelope.count,
            next: envelope.next_link,
        })
    }

    /// Await a pending envelope and parse it
    pub async fn from_request_result<F, E>(pending: F) -> Result<Self, E>
    where
        F: Future<Output = Result<PlainODataResponse, E>>,
        E: From<ODataError>,
    {
        let envelope = pending.await?;
        Self::from_plain_object(envelope).map_err(E::from)
    }

    pub async fn from_request_result_v4<F, E>(pending: F) -> Result<Self, E>
    where
        F: Future<Output = Result<PlainODataResponseV4, E>>,
        E: From<ODataError>,
    {
        let envelope = pending.await?;
        Self::from_plain_object_v4(envelope).map_err(E::from)
    }
}

impl<T> CollectionResult<T> {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.results.iter()
    }

    pub fn into_inner(self) -> Vec<T> {
        self.results
    }

    /// Re-hydrate every element as another type
    pub fn into_typed<U: DeserializeOwned>(self) -> Result<CollectionResult<U>, ODataError>
    where
        T: Serialize,
    {
        let results = self
            .results
            .into_iter()
            .map(|item| -> Result<U, ODataError> {
                Ok(serde_json::from_value(serde_json::to_value(item)?)?)
            })
            .collect::<Result<Vec<U>, ODataError>>()?;

        Ok(CollectionResult {
            results,
            count: self.count,
            next: self.next,
        })
    }
}

impl<T> IntoIterator for CollectionResult<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

fn hydrate_all<T: DeserializeOwned>(items: Vec<Value>) -> Result<Vec<T>, ODataError> {
    items.into_iter().map(from_plain_object).collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
