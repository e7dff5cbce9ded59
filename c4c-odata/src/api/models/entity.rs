//! Entity records and navigation placeholders

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `__metadata` block attached by the service to every entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityMetadata {
    /// Addressable resource locator of the entity
    pub uri: String,
    /// Qualified entity type, e.g. `c4codata.Account`
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Optimistic concurrency token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// Anything that can be addressed through its `__metadata`
///
/// Implement this for your own entity structs to use them with
/// [`ODataClient::update`](crate::api::ODataClient::update) and
/// [`ODataClient::delete`](crate::api::ODataClient::delete).
pub trait ODataEntity: Serialize + DeserializeOwned {
    fn metadata(&self) -> Option<&EntityMetadata>;

    fn uri(&self) -> Option<&str> {
        self.metadata()
            .map(|m| m.uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    fn etag(&self) -> Option<&str> {
        self.metadata().and_then(|m| m.etag.as_deref())
    }
}

/// Open entity record
///
/// Known fields are typed, every other property of the payload is kept in
/// `extra` so nothing the server sends is lost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entity {
    #[serde(rename = "__metadata", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EntityMetadata>,
    #[serde(rename = "ObjectID", skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(rename = "ParentObjectID", skip_serializing_if = "Option::is_none")]
    pub parent_object_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity {
    /// Look up a property that is not one of the typed fields
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Deferred navigation property stored under `key`, if it is still deferred
    pub fn deferred(&self, key: &str) -> Option<DeferredNavigationProperty> {
        self.get(key)
            .and_then(|v| serde_json::from_value::<DeferredNavigationProperty>(v.clone()).ok())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.extra.insert(key.into(), value.into());
    }
}

impl ODataEntity for Entity {
    fn metadata(&self) -> Option<&EntityMetadata> {
        self.metadata.as_ref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredUri {
    pub uri: String,
}

/// Stand-in for a related entity that has not been fetched yet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredNavigationProperty {
    #[serde(rename = "__deferred")]
    pub deferred: DeferredUri,
}

impl DeferredNavigationProperty {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            deferred: DeferredUri { uri: uri.into() },
        }
    }

    pub fn uri(&self) -> &str {
        &self.deferred.uri
    }
}

/// A navigation property that is either still deferred or was expanded inline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NavigationProperty<T> {
    Deferred(DeferredNavigationProperty),
    Expanded(T),
}

impl<T> NavigationProperty<T> {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    pub fn expanded(&self) -> Option<&T> {
        match self {
            Self::Expanded(value) => Some(value),
            Self::Deferred(_) => None,
        }
    }

    pub fn deferred_uri(&self) -> Option<&str> {
        match self {
            Self::Deferred(d) => Some(d.uri()),
            Self::Expanded(_) => None,
        }
    }
}
