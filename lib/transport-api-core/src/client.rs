//! The executor capability.
//!
//! [`Executor`] is the single "execute one request, get one response" primitive every
//! layer of a pipeline implements: the base transport, each decorator and the composed
//! pipeline itself. Endpoint clients only ever see this trait.

use std::future::Future;
use std::sync::Arc;

use crate::{Request, Response, Result};

/// Core HTTP execution trait.
///
/// An implementation returns `Ok` for every HTTP exchange it completes, whatever the
/// status code. `Err` means no usable response exists.
pub trait Executor: Send + Sync {
    /// Execute an HTTP request and return the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails for any reason:
    /// - Network errors
    /// - TLS errors
    /// - Timeouts
    /// - Cancellation of the request context
    fn execute(&self, request: Request) -> impl Future<Output = Result<Response>> + Send;
}

impl<E: Executor> Executor for Arc<E> {
    fn execute(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        (**self).execute(request)
    }
}

impl<E: Executor> Executor for &E {
    fn execute(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        (**self).execute(request)
    }
}
