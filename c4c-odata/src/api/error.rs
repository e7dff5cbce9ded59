//! Error type shared by the query, hydration, transport and batch layers

use thiserror::Error;

/// Errors surfaced by the OData client core
///
/// Nothing in this crate swallows or retries these; they always reach the
/// immediate caller.
#[derive(Debug, Error)]
pub enum ODataError {
    /// The server answered with an `error` block. Displays exactly the server's
    /// human readable message so it can be shown to an end user as-is.
    #[error("{message}")]
    Server {
        code: String,
        message: String,
        lang: Option<String>,
    },

    /// A JSON payload could not be turned into the requested type
    #[error("failed to hydrate entity: {0}")]
    Hydration(#[from] serde_json::Error),

    /// A request body could not be serialized to JSON
    #[error("failed to serialize request body: {0}")]
    Serialization(serde_json::Error),

    /// The envelope carried neither `error` nor the expected result container
    #[error("malformed OData envelope: {0}")]
    MalformedEnvelope(String),

    /// Non-success HTTP status whose body was not an OData error envelope
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// `$batch` framing could not be built or parsed
    #[error("batch error: {0}")]
    Batch(String),

    /// The transport failed before a response was produced
    #[error(transparent)]
    Transport(anyhow::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ODataError {
    /// Build a server-reported error
    pub fn server(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Server {
            code: code.into(),
            message: message.into(),
            lang: None,
        }
    }

    /// Machine readable discriminator of a server-reported error
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Server { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Check if this error was reported by the server inside an envelope
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Server { .. })
    }
}

impl From<reqwest::Error> for ODataError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_displays_message_only() {
        let err = ODataError::server("400", "Bad Request");
        assert_eq!(err.to_string(), "Bad Request");
        assert_eq!(err.code(), Some("400"));
        assert!(err.is_server_error());
    }

    #[test]
    fn test_other_errors_have_no_code() {
        let err = ODataError::Batch("missing boundary".to_string());
        assert_eq!(err.code(), None);
        assert!(!err.is_server_error());
    }
}
