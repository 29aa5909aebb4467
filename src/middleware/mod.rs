//! Built-in filters.
//!
//! Middleware is the right place for cross-cutting concerns: structured
//! tracing, request-id injection, header decoration. Anything here is an
//! ordinary [`Filter`](crate::Filter); register it like your own.
//!
//! - [`Trace`]: logs method, path, status and latency once the response is out
//! - [`SetHeader`]: stamps a header on every response passing through

mod headers;
mod trace;

pub use headers::SetHeader;
pub use trace::{Started, Trace};
