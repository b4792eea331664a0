//! Core types and traits for the transport API client pipeline.
//!
//! This crate provides the foundational types shared by every pipeline layer:
//! - [`Executor`] - the single "execute a request, get a response" capability
//! - [`Request`] and [`RequestBuilder`] - HTTP request types
//! - [`RequestContext`] - cancellation, deadline and typed values carried by a request
//! - [`LogLevel`] - per-request log severity stored in the context
//! - [`Response`] - HTTP response type
//! - [`Error`] and [`Result`] - Error handling
//! - [`Method`], [`StatusCode`] and [`header`] - re-exported from the `http` crate

mod body;
mod client;
mod context;
mod error;
mod log_level;
pub mod prelude;
mod request;
mod response;

pub use body::{ContentType, from_json, to_json, to_query_string};
pub use client::Executor;
pub use context::RequestContext;
pub use error::{Error, Result};
pub use log_level::LogLevel;
pub use request::{Request, RequestBuilder};
pub use response::Response;

// Re-export http crate types for methods, status codes and headers
pub use http::{HeaderMap, Method, StatusCode, header};

// Re-export the cancellation primitive carried by `RequestContext`
pub use tokio_util::sync::CancellationToken;
