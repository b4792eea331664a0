//! Tower middleware layers for the request pipeline.
//!
//! Each decorator is a Tower [`Layer`] producing a service with the same
//! `Request -> Result<Response>` contract as the one it wraps, so decorators stack in
//! any order. When assembled through [`PipelineBuilder`](crate::PipelineBuilder), the
//! first layer added is the outermost one: it sees the request first and the
//! response last.
//!
//! # Available Layers
//!
//! - [`TransportTokenLayer`] - Sets the `X-Transport-Token` header
//! - [`LoggingLayer`] - Logs requests/responses through a [`Logger`]
//! - [`RateLimitLayer`] - Waits on a [`RateLimiter`] (by default a [`TokenBucket`])
//!
//! Any other `tower::Layer` over the same request and response types composes too.
//!
//! # Example: Using the Builder API
//!
//! ```ignore
//! use transport_api::Pipeline;
//!
//! let pipeline = Pipeline::builder()
//!     .with_logging()
//!     .with_rate_limit(10.0, 5)?
//!     .with_transport_token("my-token")?
//!     .build();
//!
//! // Power users: raw layer access
//! use transport_api::middleware::TransportTokenLayer;
//! let pipeline = Pipeline::builder()
//!     .layer(TransportTokenLayer::try_new("my-token")?)
//!     .build();
//! ```

mod logging;
mod rate_limit;
mod transport_token;

pub use logging::{Logger, Logging, LoggingLayer, TracingLogger, WriterLogger};
pub use rate_limit::{RateLimit, RateLimitLayer, RateLimiter, TokenBucket};
pub use transport_token::{TRANSPORT_TOKEN_HEADER, TransportToken, TransportTokenLayer};

// Re-export tower types for convenience
pub use tower::{Layer, ServiceBuilder};
