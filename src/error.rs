//! Error types for the Mastodon client core.

use std::fmt;
use thiserror::Error;

/// A default header given to [`ClientBuilder`](crate::ClientBuilder) that is
/// not valid HTTP.
#[derive(Debug, Clone, Error)]
pub enum InvalidHeaderError {
    #[error("invalid header name: {0}")]
    InvalidName(String),
    #[error("invalid header value: {0}")]
    InvalidValue(String),
}

/// Structured rejection sent by the server as `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// Value of the `error` member.
    pub description: String,
    /// Value of the optional `error_description` member.
    pub details: Option<String>,
    /// The whole object the server returned.
    pub raw: serde_json::Value,
}

impl ApiError {
    /// Build from a top-level object known to carry an `error` member.
    pub(crate) fn from_object(raw: serde_json::Value) -> Self {
        let description = match raw.get("error") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let details = raw
            .get("error_description")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Self {
            description,
            details,
            raw,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{}: {}", self.description, details),
            None => f.write_str(&self.description),
        }
    }
}

impl std::error::Error for ApiError {}

/// Failure to turn a response body into the requested type.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The body is not well-formed JSON.
    #[error("malformed response: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The server answered with an error object.
    #[error("api error: {0}")]
    Api(ApiError),

    /// Well-formed JSON that does not fit the requested type.
    #[error("unexpected response shape: {0}")]
    Mismatch(#[source] serde_json::Error),
}

impl DecodeError {
    /// The server's error object, if this failure carries one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            DecodeError::Api(err) => Some(err),
            _ => None,
        }
    }
}

/// Failure while extracting pagination cursors from a `Link` header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkHeaderError {
    #[error("invalid id {value:?} in rel=\"{relation}\" link")]
    InvalidId { relation: String, value: String },
}

/// Terminal failure of a streaming connection.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("unknown stream event: {0}")]
    UnknownEvent(String),

    #[error("invalid status id in delete event: {0:?}")]
    InvalidDeleteId(String),

    #[error("stream payload: {0}")]
    Decode(#[from] DecodeError),

    #[error("stream transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Main error type for client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("pagination: {0}")]
    Pagination(#[from] LinkHeaderError),

    #[error("http error {status} for {url}")]
    Http { status: u16, url: String },

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("timeout")]
    Timeout,

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    InvalidHeader(#[from] InvalidHeaderError),
}

impl ClientError {
    /// HTTP status code if applicable
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            ClientError::Network(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The server's error object, if this failure carries one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ClientError::Decode(err) => err.api_error(),
            ClientError::Stream(StreamError::Decode(err)) => err.api_error(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Network(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_error_prefers_string_description() {
        let err = ApiError::from_object(json!({"error": "Record not found"}));
        assert_eq!(err.description, "Record not found");
        assert_eq!(err.details, None);
        assert_eq!(err.to_string(), "Record not found");
    }

    #[test]
    fn api_error_keeps_oauth_details() {
        let err = ApiError::from_object(json!({
            "error": "invalid_grant",
            "error_description": "The provided authorization grant is invalid"
        }));
        assert_eq!(
            err.to_string(),
            "invalid_grant: The provided authorization grant is invalid"
        );
    }

    #[test]
    fn api_error_stringifies_non_string_error() {
        let err = ApiError::from_object(json!({"error": {"code": 7}}));
        assert_eq!(err.description, r#"{"code":7}"#);
    }

    #[test]
    fn client_error_exposes_nested_api_error() {
        let api = ApiError::from_object(json!({"error": "nope"}));
        let err = ClientError::from(StreamError::Decode(DecodeError::Api(api.clone())));
        assert_eq!(err.api_error(), Some(&api));
        assert_eq!(err.status_code(), None);
    }
}
