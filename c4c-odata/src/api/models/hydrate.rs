//! Turning plain JSON objects into typed entities
//!
//! Hydration is a property copy: every property of the raw object lands on the
//! target, either in a typed field or, for open types like
//! [`Entity`](super::Entity), in the flattened `extra` map. Fields missing from
//! the raw object keep the target type's defaults when it derives them with
//! `#[serde(default)]`.
//!
//! Nothing here looks at server error blocks; that happens one layer up in
//! [`SingleResult`](super::SingleResult) and
//! [`CollectionResult`](super::CollectionResult).

use std::future::Future;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::error::ODataError;

/// Hydrate a raw JSON object into `T`
pub fn from_plain_object<T: DeserializeOwned>(raw: Value) -> Result<T, ODataError> {
    Ok(serde_json::from_value(raw)?)
}

/// Await a pending raw payload, then hydrate it
///
/// A failure of `pending` itself is returned unchanged.
pub async fn from_request_result<T, F, E>(pending: F) -> Result<T, E>
where
    T: DeserializeOwned,
    F: Future<Output = Result<Value, E>>,
    E: From<ODataError>,
{
    let raw = pending.await?;
    from_plain_object(raw).map_err(E::from)
}
