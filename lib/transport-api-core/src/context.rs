//! Per-request execution context.
//!
//! A [`RequestContext`] travels with every [`Request`](crate::Request) through the
//! pipeline. It carries:
//!
//! - a cancellation signal ([`CancellationToken`]), shared by every clone;
//! - an optional deadline;
//! - typed side-channel values, keyed by type (see [`RequestContext::with_value`]).
//!
//! Decorators read values from the context and pass it on; they never swap out its
//! cancellation signal.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use transport_api_core::{LogLevel, RequestContext};
//!
//! let ctx = RequestContext::new()
//!     .with_timeout(Duration::from_secs(5))
//!     .with_log_level(LogLevel::DEBUG);
//!
//! assert!(ctx.deadline().is_some());
//! assert_eq!(LogLevel::from_context(&ctx), LogLevel::DEBUG);
//! ```

use std::time::{Duration, Instant};

use http::Extensions;
use tokio_util::sync::CancellationToken;

use crate::Error;

/// Cancellation signal, deadline and typed values attached to one request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
    values: Extensions,
}

impl RequestContext {
    /// Creates an empty context: never cancelled, no deadline, no values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `token` as the cancellation signal of this context.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Sets a deadline. An earlier deadline already present is kept.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Sets a deadline `timeout` from now.
    ///
    /// A timeout too large to represent leaves the context without deadline.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Attaches a typed value, replacing any previous value of the same type.
    #[must_use]
    pub fn with_value<T>(mut self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.values.insert(value);
        self
    }

    /// Returns the value of type `T`, if one was attached.
    #[must_use]
    pub fn value<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.values.get::<T>()
    }

    /// The cancellation signal of this context.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Cancels this context and every clone of it.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// The deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns why the context is done, or `None` while it is still live.
    ///
    /// Cancellation takes precedence over an expired deadline.
    #[must_use]
    pub fn err(&self) -> Option<Error> {
        if self.cancellation.is_cancelled() {
            return Some(Error::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Error::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    ///
    /// Never resolves for a context without deadline that is never cancelled.
    pub async fn done(&self) -> Error {
        match self.deadline {
            Some(deadline) => {
                let deadline = tokio::time::Instant::from_std(deadline);
                tokio::select! {
                    biased;
                    () = self.cancellation.cancelled() => Error::Cancelled,
                    () = tokio::time::sleep_until(deadline) => Error::DeadlineExceeded,
                }
            }
            None => {
                self.cancellation.cancelled().await;
                Error::Cancelled
            }
        }
    }
}
