//! Raw response envelopes as sent on the wire
//!
//! v2 services wrap everything in `{ "d": { "results": ... } }` and report
//! failures as `{ "error": { "code", "message": { "lang", "value" } } }`.
//! v4 services put collections under `value`, single entities at the top level
//! and carry `@odata.*` annotations.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entity::EntityMetadata;
use crate::api::error::ODataError;

/// Error message, localized (v2) or plain text (v4)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    Localized {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
        value: String,
    },
    Text(String),
}

impl ErrorMessage {
    pub fn text(&self) -> &str {
        match self {
            Self::Localized { value, .. } => value,
            Self::Text(text) => text,
        }
    }

    pub fn lang(&self) -> Option<&str> {
        match self {
            Self::Localized { lang, .. } => lang.as_deref(),
            Self::Text(_) => None,
        }
    }
}

/// `error` block of a failed response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerErrorBody {
    #[serde(default)]
    pub code: String,
    pub message: ErrorMessage,
}

impl ServerErrorBody {
    pub fn into_error(self) -> ODataError {
        ODataError::Server {
            lang: self.message.lang().map(str::to_string),
            message: self.message.text().to_string(),
            code: self.code,
        }
    }
}

/// `d` block of a successful v2 response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    /// One entity or an array of entities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Value>,
    /// Total count, present when `$inlinecount=allpages` was requested
    #[serde(
        rename = "_count",
        alias = "__count",
        default,
        deserialize_with = "deserialize_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub count: Option<u64>,
    /// Server driven paging link
    #[serde(rename = "__next", default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// v2 response envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlainODataResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<ResponseData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ServerErrorBody>,
}

impl PlainODataResponse {
    /// Successful envelope around `results`
    pub fn with_results(results: Value) -> Self {
        Self {
            d: Some(ResponseData {
                results: Some(results),
                ..Default::default()
            }),
            error: None,
        }
    }

    pub fn with_error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            d: None,
            error: Some(ServerErrorBody {
                code: code.into(),
                message: ErrorMessage::Localized {
                    lang: Some("en".to_string()),
                    value: message.into(),
                },
            }),
        }
    }

    /// Split the envelope into its payload, failing on a server error block
    pub fn into_data(self) -> Result<ResponseData, ODataError> {
        if let Some(error) = self.error {
            return Err(error.into_error());
        }
        self.d
            .ok_or_else(|| ODataError::MalformedEnvelope("missing `d`".to_string()))
    }
}

/// v4 response envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlainODataResponseV4 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ServerErrorBody>,
    #[serde(rename = "@odata.context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(
        rename = "@odata.count",
        default,
        deserialize_with = "deserialize_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub count: Option<u64>,
    #[serde(rename = "@odata.nextLink", default, skip_serializing_if = "Option::is_none")]
    pub next_link: Option<String>,
    /// Collection payload, or a single entity's own `value` property
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Single entity payload and its annotations
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl PlainODataResponseV4 {
    pub fn check_error(&mut self) -> Result<(), ODataError> {
        match self.error.take() {
            Some(error) => Err(error.into_error()),
            None => Ok(()),
        }
    }
}

/// Map v4 entity annotations onto a `__metadata` block
///
/// Lets the same entity types hydrate from both protocol versions. Objects that
/// already carry `__metadata` are left alone.
pub fn normalize_v4_entity(value: Value) -> Value {
    let Value::Object(mut map) = value else {
        return value;
    };
    if map.contains_key("__metadata") {
        return Value::Object(map);
    }

    let annotation = |map: &Map<String, Value>, key: &str| {
        map.get(key).and_then(Value::as_str).map(str::to_string)
    };
    let uri = annotation(&map, "@odata.editLink").or_else(|| annotation(&map, "@odata.id"));
    let entity_type = annotation(&map, "@odata.type");
    let etag = annotation(&map, "@odata.etag");

    if uri.is_some() || entity_type.is_some() || etag.is_some() {
        let metadata = EntityMetadata {
            uri: uri.unwrap_or_default(),
            entity_type: entity_type
                .map(|t| t.trim_start_matches('#').to_string())
                .unwrap_or_default(),
            etag,
        };
        if let Ok(metadata) = serde_json::to_value(metadata) {
            map.insert("__metadata".to_string(), metadata);
        }
    }

    Value::Object(map)
}

/// Counts arrive as strings in v2 and as numbers in v4
fn deserialize_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid count: {}", n))),
        Some(Value::String(s)) => s
            .parse::<u64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid count: {}", s))),
        Some(other) => Err(de::Error::custom(format!("invalid count: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_v2_error_envelope() {
        let envelope: PlainODataResponse = serde_json::from_value(json!({
            "error": { "code": "400", "message": { "lang": "en", "value": "Bad Request" } }
        }))
        .unwrap();

        let err = envelope.into_data().unwrap_err();
        assert_eq!(err.to_string(), "Bad Request");
        assert_eq!(err.code(), Some("400"));
        match err {
            ODataError::Server { lang, .. } => assert_eq!(lang.as_deref(), Some("en")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_v4_plain_text_error() {
        let mut envelope: PlainODataResponseV4 = serde_json::from_value(json!({
            "error": { "code": "0x80040217", "message": "Record not found" }
        }))
        .unwrap();

        let err = envelope.check_error().unwrap_err();
        assert_eq!(err.to_string(), "Record not found");
        assert_eq!(err.code(), Some("0x80040217"));
    }

    #[test]
    fn test_count_as_string_or_number() {
        let data: ResponseData =
            serde_json::from_value(json!({ "results": [], "__count": "12" })).unwrap();
        assert_eq!(data.count, Some(12));

        let data: ResponseData =
            serde_json::from_value(json!({ "results": [], "_count": 3 })).unwrap();
        assert_eq!(data.count, Some(3));

        let bad = serde_json::from_value::<ResponseData>(json!({ "_count": "many" }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_missing_d_is_malformed() {
        let err = PlainODataResponse::default().into_data().unwrap_err();
        assert!(matches!(err, ODataError::MalformedEnvelope(_)));
    }

    #[test]
    fn test_v4_envelope_splits_annotations() {
        let envelope: PlainODataResponseV4 = serde_json::from_value(json!({
            "@odata.context": "$metadata#accounts",
            "@odata.count": 2,
            "@odata.nextLink": "accounts?$skiptoken=2",
            "value": [{ "name": "a" }, { "name": "b" }]
        }))
        .unwrap();

        assert_eq!(envelope.context.as_deref(), Some("$metadata#accounts"));
        assert_eq!(envelope.count, Some(2));
        assert_eq!(envelope.next_link.as_deref(), Some("accounts?$skiptoken=2"));
        assert_eq!(
            envelope.value.as_ref().and_then(Value::as_array).map(Vec::len),
            Some(2)
        );
        assert!(envelope.properties.is_empty());
    }

    #[test]
    fn test_normalize_v4_entity() {
        let normalized = normalize_v4_entity(json!({
            "@odata.etag": "W/\"123\"",
            "@odata.editLink": "accounts(1)",
            "name": "Acme"
        }));

        assert_eq!(normalized["__metadata"]["uri"], "accounts(1)");
        assert_eq!(normalized["__metadata"]["etag"], "W/\"123\"");
        assert_eq!(normalized["name"], "Acme");

        let plain = normalize_v4_entity(json!({ "name": "Acme" }));
        assert!(plain.get("__metadata").is_none());
    }
}
