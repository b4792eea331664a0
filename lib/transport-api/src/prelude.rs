//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types for easy glob importing:
//!
//! ```ignore
//! use transport_api::prelude::*;
//! ```

pub use crate::{
    ApiResponse, ClientConfig, ContentType, Error, Executor, LogLevel, Method, Pipeline,
    PipelineBuilder, Request, RequestBuilder, RequestContext, Response, Result, StatusCode,
    TransportApiClient, header,
};
pub use crate::middleware::{Logger, RateLimiter};
