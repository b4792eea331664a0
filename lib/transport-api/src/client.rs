//! Base HTTP transport and the decorator pipeline built around it.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderValue, USER_AGENT};
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use tower::Layer;
use tower::util::BoxCloneService;
use tower_service::Service;

use crate::{
    Error, Executor, Request, Response, Result,
    config::{ClientConfig, ClientConfigBuilder},
    connector::https_connector,
    middleware::{
        Logger, LoggingLayer, RateLimitLayer, RateLimiter, TokenBucket, TransportTokenLayer,
    },
};

// ============================================================================
// Type-Erased Service for Middleware Composition
// ============================================================================

/// Type-erased service for middleware composition.
///
/// This type allows storing and composing arbitrary Tower layers without
/// exposing complex generic types to users.
pub type BoxedService = BoxCloneService<Request, Response, Error>;

/// Future type for Tower Service implementation.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Response>> + Send + 'static>>;

/// One step of a pipeline: wraps a service into a decorated one.
///
/// Built from any Tower [`Layer`] over the pipeline's request and response types.
#[derive(Clone)]
pub struct Decorator {
    wrap: Arc<dyn Fn(BoxedService) -> BoxedService + Send + Sync>,
}

impl std::fmt::Debug for Decorator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decorator").finish_non_exhaustive()
    }
}

impl Decorator {
    /// Wrap a Tower layer.
    pub fn new<L>(layer: L) -> Self
    where
        L: Layer<BoxedService> + Send + Sync + 'static,
        L::Service: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
        <L::Service as Service<Request>>::Future: Send,
    {
        Self {
            wrap: Arc::new(move |service| BoxCloneService::new(layer.layer(service))),
        }
    }

    /// Decorate `service`.
    #[must_use]
    pub fn apply(&self, service: BoxedService) -> BoxedService {
        (self.wrap)(service)
    }
}

/// Compose `decorators` around `base`.
///
/// The first decorator is the outermost: `[a, b]` over `x` gives `a(b(x))`, so a
/// request flows through `a`, then `b`, then `x`, and the response comes back the
/// other way. An empty list gives `base` unchanged.
pub fn compose<S>(base: S, decorators: &[Decorator]) -> BoxedService
where
    S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    decorators
        .iter()
        .rev()
        .fold(BoxCloneService::new(base), |service, decorator| {
            decorator.apply(service)
        })
}

/// Thread-safe wrapper for `BoxedService`.
///
/// This wrapper uses a Mutex to make the service Sync, which is required
/// by the `Executor` trait.
#[derive(Clone)]
struct SyncService {
    inner: Arc<Mutex<BoxedService>>,
}

impl SyncService {
    fn new(service: BoxedService) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }

    fn call(&self, request: Request) -> ServiceFuture {
        // Lock, clone the service, and release the lock immediately
        let mut service = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        Box::pin(async move { service.call(request).await })
    }
}

// ============================================================================
// Base Transport
// ============================================================================

/// The innermost executor: sends requests over HTTP(S) with hyper.
///
/// Every completed exchange is an `Ok` response, whatever its status. The request
/// context is not observed here; cancellation is handled by the rate limiter.
#[derive(Clone)]
pub struct HttpTransport {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    user_agent: Option<HeaderValue>,
    config: ClientConfig,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Create a transport with the given configuration.
    ///
    /// A `user_agent` that is not a legal header value is ignored.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let connector = https_connector(config.connect_timeout);
        let inner = Client::builder(TokioExecutor::new()).build(connector);

        let user_agent = match HeaderValue::from_str(&config.user_agent) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(
                    user_agent = %config.user_agent,
                    error = %err,
                    "ignoring invalid user agent"
                );
                None
            }
        };

        Self {
            inner,
            user_agent,
            config,
        }
    }

    /// Get the transport configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build a hyper request from a transport request.
    fn build_hyper_request(&self, request: Request) -> Result<http::Request<Full<Bytes>>> {
        let (method, url, mut headers, body, _context) = request.into_parts();

        if let Some(user_agent) = &self.user_agent {
            headers
                .entry(USER_AGENT)
                .or_insert_with(|| user_agent.clone());
        }

        let body = body.map_or_else(Full::default, Full::new);
        let mut http_request = http::Request::builder()
            .method(method)
            .uri(url.as_str())
            .body(body)
            .map_err(|e| Error::invalid_request(e.to_string()))?;
        *http_request.headers_mut() = headers;

        Ok(http_request)
    }

    async fn send(&self, request: Request) -> Result<Response> {
        let hyper_request = self.build_hyper_request(request)?;

        let exchange = async {
            let response = self
                .inner
                .request(hyper_request)
                .await
                .map_err(Self::map_hyper_error)?;

            let (parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|e| Error::connection(e.to_string()))?
                .to_bytes();

            Ok::<_, Error>(Response::new(parts.status.as_u16(), parts.headers, body))
        };

        tokio::time::timeout(self.config.timeout, exchange)
            .await
            .map_err(|_| Error::Timeout)?
    }

    #[allow(clippy::needless_pass_by_value)]
    fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
        let msg = err.to_string();

        if err.is_connect() {
            return Error::connection(msg);
        }

        if msg.contains("ssl") || msg.contains("tls") || msg.contains("certificate") {
            return Error::tls(msg);
        }

        Error::connection(msg)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl Executor for HttpTransport {
    async fn execute(&self, request: Request) -> Result<Response> {
        self.send(request).await
    }
}

impl Service<Request> for HttpTransport {
    type Response = Response;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let transport = self.clone();
        Box::pin(async move { transport.send(request).await })
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// A base executor wrapped in decorators, assembled once and immutable afterwards.
///
/// Cloning is cheap and clones share the decorators' state (e.g. the token bucket).
///
/// # Example
///
/// ```ignore
/// use transport_api::Pipeline;
/// use std::time::Duration;
///
/// // Plain transport, no decorators
/// let pipeline = Pipeline::new();
///
/// let pipeline = Pipeline::builder()
///     .timeout(Duration::from_secs(10))
///     .with_logging()
///     .with_rate_limit(10.0, 5)?
///     .with_transport_token("my-token")?
///     .build();
/// ```
#[derive(Clone)]
pub struct Pipeline {
    service: SyncService,
    config: ClientConfig,
    decorators: usize,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("decorators", &self.decorators)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Create a pipeline over the HTTP transport with default configuration
    /// and no decorators.
    #[must_use]
    pub fn new() -> Self {
        PipelineBuilder::default().build()
    }

    /// Create a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Get the transport configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Number of decorators around the base executor.
    #[must_use]
    pub const fn decorator_count(&self) -> usize {
        self.decorators
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for Pipeline {
    async fn execute(&self, request: Request) -> Result<Response> {
        self.service.call(request).await
    }
}

impl Service<Request> for Pipeline {
    type Response = Response;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        // SyncService is always ready (the underlying service is polled when called)
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        self.service.call(request)
    }
}

/// Builder for [`Pipeline`].
///
/// Decorators are kept in the order they are added; the first one added is the
/// outermost (it processes requests first and responses last).
///
/// # Example
///
/// ```ignore
/// use transport_api::Pipeline;
///
/// // Simple usage with helper methods
/// let pipeline = Pipeline::builder()
///     .with_logging()
///     .with_transport_token("my-token")?
///     .build();
///
/// // Power users: raw layer access
/// use transport_api::middleware::RateLimitLayer;
/// let pipeline = Pipeline::builder()
///     .layer(RateLimitLayer::token_bucket(5.0, 1)?)
///     .build();
/// ```
#[derive(Default)]
pub struct PipelineBuilder {
    config: ClientConfigBuilder,
    decorators: Vec<Decorator>,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("config", &self.config)
            .field("decorators", &self.decorators.len())
            .finish()
    }
}

impl PipelineBuilder {
    // ========================================================================
    // Core Configuration
    // ========================================================================

    /// Set the request timeout of the base transport.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.timeout(timeout);
        self
    }

    /// Set the connection timeout of the base transport.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.connect_timeout(timeout);
        self
    }

    /// Set the `User-Agent` sent when a request carries none.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config = self.config.user_agent(user_agent);
        self
    }

    // ========================================================================
    // Generic Middleware API
    // ========================================================================

    /// Add a Tower layer to the pipeline.
    ///
    /// Layers are applied in order: first added = outermost (processes requests first).
    #[must_use]
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxedService> + Send + Sync + 'static,
        L::Service: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
        <L::Service as Service<Request>>::Future: Send,
    {
        self.decorators.push(Decorator::new(layer));
        self
    }

    /// Add an already type-erased decorator.
    #[must_use]
    pub fn decorator(mut self, decorator: Decorator) -> Self {
        self.decorators.push(decorator);
        self
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    /// Set the `X-Transport-Token` header on every request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the token is not a legal header value.
    pub fn with_transport_token(self, token: impl AsRef<str>) -> Result<Self> {
        TransportTokenLayer::try_new(token).map(|layer| self.layer(layer))
    }

    /// Add request/response logging through `tracing`.
    #[must_use]
    pub fn with_logging(self) -> Self {
        self.layer(LoggingLayer::new())
    }

    /// Add request/response logging through a custom [`Logger`].
    #[must_use]
    pub fn with_logger<G: Logger>(self, logger: G) -> Self {
        self.layer(LoggingLayer::with_logger(logger))
    }

    /// Add token bucket rate limiting: `rate` requests per second, bursts of `burst`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] on invalid `rate` or `burst`.
    pub fn with_rate_limit(self, rate: f64, burst: u32) -> Result<Self> {
        TokenBucket::new(rate, burst).map(|bucket| self.with_rate_limiter(bucket))
    }

    /// Add rate limiting through a custom [`RateLimiter`].
    #[must_use]
    pub fn with_rate_limiter<L: RateLimiter>(self, limiter: L) -> Self {
        self.layer(RateLimitLayer::new(limiter))
    }

    // ========================================================================
    // Build
    // ========================================================================

    /// Build the pipeline over the HTTP transport.
    #[must_use]
    pub fn build(self) -> Pipeline {
        let config = self.config.clone().build();
        let transport = HttpTransport::new(config);
        self.build_with(transport)
    }

    /// Build the pipeline over a custom base executor.
    #[must_use]
    pub fn build_with<S>(self, base: S) -> Pipeline
    where
        S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
        S::Future: Send,
    {
        let service = compose(base, &self.decorators);
        Pipeline {
            service: SyncService::new(service),
            config: self.config.build(),
            decorators: self.decorators.len(),
        }
    }
}
