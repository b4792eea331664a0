//! Transport token authentication middleware.
//!
//! Sets the `X-Transport-Token` header on every outgoing request, replacing any
//! value already present, then hands the request to the inner service.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use http::header::{HeaderName, HeaderValue};
use tower::{Layer, Service};

use crate::{Error, Request, Response, Result};

/// Header carrying the transport token.
pub const TRANSPORT_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-transport-token");

/// Layer that adds the transport token to requests.
///
/// # Example
///
/// ```ignore
/// use transport_api::middleware::TransportTokenLayer;
///
/// let client = Pipeline::builder()
///     .layer(TransportTokenLayer::try_new("secret")?)
///     .build();
/// ```
#[derive(Clone)]
pub struct TransportTokenLayer {
    token: HeaderValue,
}

impl std::fmt::Debug for TransportTokenLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportTokenLayer")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl TransportTokenLayer {
    /// Create a layer injecting `token`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the token is not a legal header value.
    pub fn try_new(token: impl AsRef<str>) -> Result<Self> {
        let mut token = HeaderValue::from_str(token.as_ref())
            .map_err(|e| Error::invalid_header(format!("transport token: {e}")))?;
        token.set_sensitive(true);
        Ok(Self { token })
    }
}

impl<S> Layer<S> for TransportTokenLayer {
    type Service = TransportToken<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TransportToken {
            inner,
            token: self.token.clone(),
        }
    }
}

/// Service that adds the transport token to requests.
#[derive(Clone)]
pub struct TransportToken<S> {
    inner: S,
    token: HeaderValue,
}

impl<S> Service<Request> for TransportToken<S>
where
    S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        request
            .headers_mut()
            .insert(TRANSPORT_TOKEN_HEADER, self.token.clone());

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(request).await })
    }
}

#[cfg(test)]
mod tests {
    use tower::ServiceExt;

    use super::*;
    use crate::Method;

    /// Answers with the token it received as the body.
    #[derive(Clone)]
    struct EchoToken;

    impl Service<Request> for EchoToken {
        type Response = Response;
        type Error = Error;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, request: Request) -> Self::Future {
            let token = request.header("X-Transport-Token").unwrap_or("").to_string();
            Box::pin(async move { Ok(Response::new(200, http::HeaderMap::new(), token)) })
        }
    }

    fn request() -> Request {
        let url = url::Url::parse("https://mg.example.com/api/messages").expect("valid url");
        Request::builder(Method::POST, url).build()
    }

    #[tokio::test]
    async fn injects_token() {
        let service = TransportTokenLayer::try_new("secret")
            .expect("valid token")
            .layer(EchoToken);

        let response = service.oneshot(request()).await.expect("response");

        assert_eq!(response.text().expect("utf8"), "secret");
    }

    #[tokio::test]
    async fn overwrites_existing_token() {
        let service = TransportTokenLayer::try_new("fresh")
            .expect("valid token")
            .layer(EchoToken);

        let url = url::Url::parse("https://mg.example.com/api/messages").expect("valid url");
        let request = Request::builder(Method::POST, url)
            .try_header("x-transport-token", "stale")
            .expect("header")
            .build();

        let response = service.oneshot(request).await.expect("response");

        assert_eq!(response.text().expect("utf8"), "fresh");
    }

    #[test]
    fn rejects_invalid_token() {
        let result = TransportTokenLayer::try_new("bad\r\ntoken");
        assert!(matches!(result, Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn debug_redacts_token() {
        let layer = TransportTokenLayer::try_new("secret").expect("valid token");
        assert!(!format!("{layer:?}").contains("secret"));
    }
}
