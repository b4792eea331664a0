//! Prelude module for convenient imports.
//!
//! ```ignore
//! use transport_api_core::prelude::*;
//! ```

pub use crate::{
    ContentType, Error, Executor, LogLevel, Method, Request, RequestBuilder, RequestContext,
    Response, Result, from_json, to_json,
};
