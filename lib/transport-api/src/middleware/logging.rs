//! Request/response logging middleware.
//!
//! Every request produces two lines through a [`Logger`]: one when it starts, one
//! when it finishes (with the status or the error, and the time it took).
//!
//! The severity of each line travels on the [`RequestContext`] handed to the logger.
//! The middleware tags `DEBUG` on the start and success lines and `ERROR` on failures,
//! replacing any level the caller attached; the logger decides what to print for it.

use std::fmt;
use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::time::Instant;
use tower::{Layer, Service};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::{Error, LogLevel, Request, RequestContext, Response, Result};

/// Sink for log lines.
///
/// Implementations resolve the severity with [`LogLevel::from_context`] and must not
/// block for long: they run inline with every request.
pub trait Logger: Send + Sync + 'static {
    /// Emit one line.
    fn log(&self, ctx: &RequestContext, args: fmt::Arguments<'_>);
}

/// Forwards lines to `tracing` events of the matching level.
///
/// `FATAL` lines become `error!` events with a `fatal = true` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, ctx: &RequestContext, args: fmt::Arguments<'_>) {
        match LogLevel::from_context(ctx) {
            LogLevel::DEBUG => debug!("{args}"),
            LogLevel::INFO => info!("{args}"),
            LogLevel::WARN => warn!("{args}"),
            LogLevel::ERROR => error!("{args}"),
            LogLevel::FATAL => error!(fatal = true, "{args}"),
            other => info!(level = %other, "{args}"),
        }
    }
}

/// Writes `[LEVEL] message` lines to any [`Write`] sink.
///
/// Write failures are ignored.
#[derive(Debug, Default)]
pub struct WriterLogger<W> {
    writer: Mutex<W>,
}

impl<W> WriterLogger<W> {
    /// Create a logger writing to `writer`.
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Get back the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WriterLogger<std::io::Stderr> {
    /// Create a logger writing to standard error.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send + 'static> Logger for WriterLogger<W> {
    fn log(&self, ctx: &RequestContext, args: fmt::Arguments<'_>) {
        let level = LogLevel::from_context(ctx);
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(writer, "[{level}] {args}");
    }
}

/// Layer that adds request/response logging.
///
/// # Example
///
/// ```ignore
/// use transport_api::middleware::{LoggingLayer, WriterLogger};
///
/// // tracing events
/// let layer = LoggingLayer::new();
///
/// // plain lines on stderr
/// let layer = LoggingLayer::with_logger(WriterLogger::stderr());
/// ```
#[derive(Debug)]
pub struct LoggingLayer<G = TracingLogger> {
    logger: Arc<G>,
}

impl<G> Clone for LoggingLayer<G> {
    fn clone(&self) -> Self {
        Self {
            logger: Arc::clone(&self.logger),
        }
    }
}

impl LoggingLayer {
    /// Create a logging layer emitting `tracing` events.
    #[must_use]
    pub fn new() -> Self {
        Self::with_logger(TracingLogger)
    }
}

impl Default for LoggingLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Logger> LoggingLayer<G> {
    /// Create a logging layer writing through `logger`.
    pub fn with_logger(logger: G) -> Self {
        Self {
            logger: Arc::new(logger),
        }
    }
}

impl<S, G> Layer<S> for LoggingLayer<G> {
    type Service = Logging<S, G>;

    fn layer(&self, inner: S) -> Self::Service {
        Logging {
            inner,
            logger: Arc::clone(&self.logger),
        }
    }
}

/// Service that logs requests and responses.
#[derive(Debug)]
pub struct Logging<S, G = TracingLogger> {
    inner: S,
    logger: Arc<G>,
}

impl<S: Clone, G> Clone for Logging<S, G> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            logger: Arc::clone(&self.logger),
        }
    }
}

/// Copy of `ctx` tagged with `level`.
fn at_level(ctx: &RequestContext, level: LogLevel) -> RequestContext {
    ctx.clone().with_log_level(level)
}

impl<S, G> Service<Request> for Logging<S, G>
where
    S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
    G: Logger,
{
    type Response = Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let method = request.method().clone();
        let url = request.url().clone();
        let ctx = request.context().clone();
        let logger = Arc::clone(&self.logger);

        let span = info_span!("http_request", %method, %url);

        let mut inner = self.inner.clone();
        Box::pin(
            async move {
                let start = Instant::now();
                logger.log(
                    &at_level(&ctx, LogLevel::DEBUG),
                    format_args!("HTTP {method} {url} - started"),
                );

                let result = inner.call(request).await;
                let elapsed = start.elapsed();

                match &result {
                    Ok(response) => logger.log(
                        &at_level(&ctx, LogLevel::DEBUG),
                        format_args!(
                            "HTTP {method} {url} - {} {} (took {elapsed:?})",
                            response.status(),
                            response.status_text()
                        ),
                    ),
                    Err(err) => logger.log(
                        &at_level(&ctx, LogLevel::ERROR),
                        format_args!("HTTP {method} {url} - ERROR: {err} (took {elapsed:?})"),
                    ),
                }

                result
            }
            .instrument(span),
        )
    }
}
