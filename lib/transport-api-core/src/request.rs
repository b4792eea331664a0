//! HTTP request building.
//!
//! Use [`Request::builder`] to construct requests with headers, query parameters,
//! a body and the [`RequestContext`] they execute under.
//!
//! # Example
//!
//! ```
//! use transport_api_core::{Method, Request, RequestContext};
//!
//! let request = Request::builder(Method::GET, "https://mg.example.com/api/channels".parse().unwrap())
//!     .try_header("Accept", "application/json")
//!     .unwrap()
//!     .query("id", "1")
//!     .context(RequestContext::new())
//!     .build();
//!
//! assert_eq!(request.header("accept"), Some("application/json"));
//! ```

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method};

use crate::{ContentType, Error, RequestContext, Result};

/// An HTTP request with method, URL, headers, optional body and execution context.
///
/// Header names are case-insensitive; inserting a header replaces every previous
/// value of that name.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: url::Url,
    headers: HeaderMap,
    body: Option<Bytes>,
    context: RequestContext,
}

impl Request {
    /// Creates a new [`RequestBuilder`].
    #[must_use]
    pub fn builder(method: Method, url: url::Url) -> RequestBuilder {
        RequestBuilder::new(method, url)
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request URL.
    #[must_use]
    pub fn url(&self) -> &url::Url {
        &self.url
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to headers.
    #[must_use]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Single header value by name, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Request body.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Execution context of this request.
    #[must_use]
    pub const fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Consume into (method, url, headers, body, context).
    #[must_use]
    pub fn into_parts(self) -> (Method, url::Url, HeaderMap, Option<Bytes>, RequestContext) {
        (self.method, self.url, self.headers, self.body, self.context)
    }
}

/// Builder for constructing [`Request`] instances.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    url: url::Url,
    headers: HeaderMap,
    body: Option<Bytes>,
    context: RequestContext,
}

impl RequestBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(method: Method, url: url::Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            context: RequestContext::default(),
        }
    }

    /// Sets a header, replacing any previous value.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a header from strings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the name or value is not a legal header.
    pub fn try_header(self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::try_from(name).map_err(|e| Error::invalid_header(e.to_string()))?;
        let value =
            HeaderValue::try_from(value).map_err(|e| Error::invalid_header(e.to_string()))?;
        Ok(self.header(name, value))
    }

    /// Appends a query parameter to the URL.
    #[must_use]
    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(name, value);
        self
    }

    /// Replaces the query string with a pre-encoded one. Empty clears it.
    #[must_use]
    pub fn raw_query(mut self, query: &str) -> Self {
        self.url
            .set_query(if query.is_empty() { None } else { Some(query) });
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the body together with its `Content-Type`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if `content_type` is not a legal header value.
    pub fn typed_body(self, content_type: &str, body: impl Into<Bytes>) -> Result<Self> {
        let value = HeaderValue::try_from(content_type)
            .map_err(|e| Error::invalid_header(e.to_string()))?;
        Ok(self.header(CONTENT_TYPE, value).body(body))
    }

    /// Sets a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn json<T: serde::Serialize>(self, value: &T) -> Result<Self> {
        let body = crate::to_json(value)?;
        Ok(self
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static(ContentType::Json.as_str()),
            )
            .body(body))
    }

    /// Sets the execution context.
    #[must_use]
    pub fn context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Builds the [`Request`].
    #[must_use]
    pub fn build(self) -> Request {
        Request {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
            context: self.context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogLevel;

    fn url(s: &str) -> url::Url {
        url::Url::parse(s).expect("valid URL")
    }

    #[test]
    fn request_builder_basic() {
        let request = Request::builder(Method::GET, url("https://example.com/channels"))
            .try_header("Accept", "application/json")
            .expect("header")
            .build();

        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.url().as_str(), "https://example.com/channels");
        assert_eq!(request.header("Accept"), Some("application/json"));
        assert!(request.body().is_none());
    }

    #[test]
    fn headers_are_case_insensitive_last_write_wins() {
        let request = Request::builder(Method::GET, url("https://example.com"))
            .try_header("X-Transport-Token", "first")
            .expect("header")
            .try_header("x-transport-token", "second")
            .expect("header")
            .build();

        assert_eq!(request.header("X-TRANSPORT-TOKEN"), Some("second"));
        assert_eq!(request.headers().get_all("x-transport-token").iter().count(), 1);
    }

    #[test]
    fn invalid_header_is_rejected() {
        let result = Request::builder(Method::GET, url("https://example.com"))
            .try_header("X-Token", "line\nbreak");

        assert!(matches!(result, Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn request_builder_with_query() {
        let request = Request::builder(Method::GET, url("https://example.com/channels"))
            .query("id", "1")
            .query("types", "telegram")
            .build();

        assert_eq!(
            request.url().as_str(),
            "https://example.com/channels?id=1&types=telegram"
        );
    }

    #[test]
    fn raw_query_empty_clears() {
        let request = Request::builder(Method::GET, url("https://example.com/channels?x=1"))
            .raw_query("")
            .build();

        assert_eq!(request.url().as_str(), "https://example.com/channels");
    }

    #[test]
    fn request_builder_json() {
        #[derive(serde::Serialize)]
        struct Body {
            text: String,
        }

        let request = Request::builder(Method::POST, url("https://example.com/messages"))
            .json(&Body {
                text: "hello".to_string(),
            })
            .expect("json")
            .build();

        assert_eq!(request.header("Content-Type"), Some("application/json"));
        assert_eq!(
            request.body(),
            Some(&Bytes::from_static(br#"{"text":"hello"}"#))
        );
    }

    #[test]
    fn request_carries_context() {
        let ctx = RequestContext::new().with_log_level(LogLevel::WARN);
        let request = Request::builder(Method::DELETE, url("https://example.com/messages"))
            .context(ctx)
            .build();

        assert_eq!(request.context().log_level(), Some(LogLevel::WARN));
    }
}
