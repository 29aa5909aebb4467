//! The filter contract.
//!
//! A filter wraps "the rest of the chain". Code before `next.run(req)` is its
//! before-phase, code after is its after-phase:
//!
//! ```rust
//! use strata::{BoxFuture, Fault, Filter, Next, Request, Response, StatusCode};
//!
//! struct RequireToken;
//!
//! impl Filter for RequireToken {
//!     fn handle<'a>(
//!         &'a self,
//!         req: &'a mut Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Result<Response, Fault>> {
//!         Box::pin(async move {
//!             if req.header("authorization").is_none() {
//!                 // short-circuit: nothing further in runs
//!                 return Ok(Response::status(StatusCode::UNAUTHORIZED));
//!             }
//!             let mut res = next.run(req).await?;
//!             res.set_header("cache-control", "private");
//!             Ok(res)
//!         })
//!     }
//! }
//! ```
//!
//! `Next` is consumed by `run`, so delegating twice does not compile.
//!
//! Filters that need to act after the response has been delivered also
//! implement [`Terminable`] and are registered with [`Layer::terminable`].

use std::fmt;
use std::sync::Arc;

use crate::error::Fault;
use crate::pipeline::Next;
use crate::request::Request;
use crate::response::Response;

pub use futures::future::BoxFuture;

/// A unit of request-handling behaviour wrapped around the rest of the chain.
///
/// One instance serves every request concurrently: keep per-request state on
/// the [`Request`]'s attributes, never in `self`.
pub trait Filter: Send + Sync + 'static {
    /// Either return a response without touching `next` (short-circuit), or
    /// delegate inward with `next.run(req).await` and return, possibly
    /// decorate, what comes back. A `Fault` from further in surfaces at that
    /// call site and may be turned into a response here.
    fn handle<'a>(
        &'a self,
        req: &'a mut Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Fault>>;

    /// Name used in logs and for global layers. Keyed layers are named by key.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A filter with a post-response hook.
///
/// `terminate` runs after the response has been handed to the transport, once
/// per request, and only if this filter's `handle` was entered. A failure here
/// is logged and cannot change the response.
pub trait Terminable: Filter {
    fn terminate<'a>(
        &'a self,
        req: &'a Request,
        res: &'a Response,
    ) -> BoxFuture<'a, Result<(), Fault>>;
}

// ── Layer ─────────────────────────────────────────────────────────────────────

/// A registered filter: its name plus its capability.
///
/// Cloning shares the filter instance.
#[derive(Clone)]
pub struct Layer {
    name: Arc<str>,
    forward: Arc<dyn Filter>,
    capability: Capability,
}

#[derive(Clone)]
enum Capability {
    Forward,
    Terminable(Arc<dyn Terminable>),
}

impl Layer {
    /// A forward-only layer. `From<F: Filter>` does the same.
    pub fn new<F: Filter>(filter: F) -> Self {
        let name: Arc<str> = Arc::from(filter.name());
        Self { name, forward: Arc::new(filter), capability: Capability::Forward }
    }

    /// A layer whose `terminate` hook runs after the response is delivered.
    pub fn terminable<T: Terminable>(filter: T) -> Self {
        let name: Arc<str> = Arc::from(filter.name());
        let filter = Arc::new(filter);
        Self {
            name,
            forward: filter.clone(),
            capability: Capability::Terminable(filter),
        }
    }

    /// Renames the layer. Keyed registration names layers by their key.
    pub fn named(mut self, name: &str) -> Self {
        self.name = Arc::from(name);
        self
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn is_terminable(&self) -> bool {
        matches!(self.capability, Capability::Terminable(_))
    }

    /// `true` if both layers share one filter instance.
    pub fn same_filter(&self, other: &Layer) -> bool {
        Arc::ptr_eq(&self.forward, &other.forward)
    }

    pub(crate) fn filter(&self) -> &dyn Filter {
        &*self.forward
    }

    pub(crate) fn hook(&self) -> Option<&dyn Terminable> {
        match &self.capability {
            Capability::Forward => None,
            Capability::Terminable(hook) => Some(&**hook),
        }
    }
}

impl<F: Filter> From<F> for Layer {
    fn from(filter: F) -> Self {
        Self::new(filter)
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("name", &self.name)
            .field("terminable", &self.is_terminable())
            .finish()
    }
}
