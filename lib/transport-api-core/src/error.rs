//! Error types for the transport API client.
//!
//! One enum covers every failure a pipeline can surface:
//!
//! - transport failures raised by the innermost executor ([`Error::Connection`],
//!   [`Error::Tls`], [`Error::Timeout`], ...), passed through every decorator untouched;
//! - rate-limit aborts ([`Error::Cancelled`], [`Error::DeadlineExceeded`],
//!   [`Error::RateLimited`]), raised before any network attempt;
//! - API errors ([`Error::Api`]), only ever produced by a typed response's `error()`
//!   accessor, never by an executor.

use derive_more::{Display, Error, From};

/// Main error type for transport API operations.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// Request timeout enforced by the base transport.
    #[display("request timeout")]
    #[from(skip)]
    Timeout,

    /// The request context was cancelled.
    #[display("context canceled")]
    #[from(skip)]
    Cancelled,

    /// The request context deadline passed.
    #[display("context deadline exceeded")]
    #[from(skip)]
    DeadlineExceeded,

    /// A rate limiter refused to wait for a token.
    #[display("rate limit: {_0}")]
    #[from(skip)]
    RateLimited(#[error(not(source))] String),

    /// Invalid request configuration.
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// Invalid header name or value.
    #[display("invalid header: {_0}")]
    #[from(skip)]
    InvalidHeader(#[error(not(source))] String),

    /// Invalid client or middleware configuration.
    #[display("invalid configuration: {_0}")]
    #[from(skip)]
    InvalidConfig(#[error(not(source))] String),

    /// Error reported by the API in its error payload.
    #[display("{_0}")]
    #[from(skip)]
    Api(#[error(not(source))] String),

    /// JSON serialization error.
    #[display("JSON serialization error: {_0}")]
    #[from]
    JsonSerialization(serde_json::Error),

    /// JSON deserialization error with path context.
    #[display("JSON deserialization error at '{path}': {message}")]
    #[from(skip)]
    JsonDeserialization {
        /// JSON path to the error (e.g., "data.0.id").
        path: String,
        /// Error message.
        message: String,
    },

    /// Query string serialization error.
    #[display("query serialization error: {_0}")]
    #[from]
    QuerySerialization(serde_html_form::ser::Error),

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an invalid header error.
    #[must_use]
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader(message.into())
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a rate limit error.
    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited(message.into())
    }

    /// Create an API error from the server's error message.
    #[must_use]
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api(message.into())
    }

    /// Create a JSON deserialization error with path context.
    #[must_use]
    pub fn json_deserialization(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JsonDeserialization {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns `true` if the request context was cancelled or expired.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// Returns `true` if this error was reported by the API itself.
    #[must_use]
    pub const fn is_api(&self) -> bool {
        matches!(self, Self::Api(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::Timeout;
        assert_eq!(err.to_string(), "request timeout");

        let err = Error::connection("failed to connect");
        assert_eq!(err.to_string(), "connection error: failed to connect");

        let err = Error::Cancelled;
        assert_eq!(err.to_string(), "context canceled");

        let err = Error::api("channel not found");
        assert_eq!(err.to_string(), "channel not found");

        let err = Error::json_deserialization("data.0.id", "invalid type");
        assert_eq!(
            err.to_string(),
            "JSON deserialization error at 'data.0.id': invalid type"
        );
    }

    #[test]
    fn error_predicates() {
        assert!(Error::Timeout.is_timeout());
        assert!(!Error::Cancelled.is_timeout());

        assert!(Error::connection("reset").is_connection());
        assert!(!Error::Timeout.is_connection());

        assert!(Error::Cancelled.is_cancelled());
        assert!(Error::DeadlineExceeded.is_cancelled());
        assert!(!Error::rate_limited("burst").is_cancelled());

        assert!(Error::api("bad").is_api());
        assert!(!Error::Timeout.is_api());
    }

    #[test]
    fn error_from_url() {
        let err: Error = url::Url::parse("not a url").expect_err("invalid").into();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
