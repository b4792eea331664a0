//! REST client for the messaging transport API.
//!
//! Requests go through a [`Pipeline`]: a base HTTP transport wrapped in an ordered
//! chain of Tower decorators. Three decorators ship with the crate:
//!
//! - transport token authentication (`X-Transport-Token` header);
//! - request/response logging, with a per-request severity carried by the
//!   [`RequestContext`];
//! - token bucket rate limiting that honours the context's cancellation and deadline.
//!
//! [`TransportApiClient`] exposes the API endpoints on top of any [`Executor`].
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use transport_api::prelude::*;
//! use transport_api::models::ListChannelsParams;
//!
//! let client = TransportApiClient::builder("https://mg.example.com/api/transport/v1")
//!     .with_logging()
//!     .with_rate_limit(10.0, 5)?
//!     .with_transport_token("my-token")?
//!     .build()?;
//!
//! let ctx = RequestContext::new().with_timeout(Duration::from_secs(5));
//! let reply = client.list_channels(ctx, &ListChannelsParams::default()).await?;
//! for channel in reply.data().into_iter().flatten() {
//!     println!("{} {:?}", channel.id, channel.name);
//! }
//! ```

mod api_client;
mod api_response;
mod client;
mod config;
mod connector;
pub mod middleware;
#[allow(missing_docs)]
pub mod models;
pub mod prelude;

// Re-export client types
pub use api_client::{TransportApiClient, TransportApiClientBuilder};
pub use api_response::{ApiResponse, ErrorPayload};
pub use client::{
    BoxedService, Decorator, HttpTransport, Pipeline, PipelineBuilder, ServiceFuture, compose,
};
pub use config::{ClientConfig, ClientConfigBuilder};

// Re-export tower for middleware composition
pub use tower;

// Re-export core types
pub use transport_api_core::{
    CancellationToken, ContentType, Error, Executor, LogLevel, Method, Request, RequestBuilder,
    RequestContext, Response, Result, from_json, to_json, to_query_string,
};

// Re-export http types for status codes and headers
pub use transport_api_core::{HeaderMap, StatusCode, header};
