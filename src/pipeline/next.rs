//! The composed chain and its single-use continuation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::debug;

use crate::error::Fault;
use crate::filter::{BoxFuture, Layer};
use crate::handler::BoxedHandler;
use crate::request::Request;
use crate::response::Response;

/// One step of the onion. `depth` is the position in the chain; the endpoint
/// sits at `chain.len()`.
pub(crate) enum Node {
    Filter { depth: usize, layer: Layer, inner: Box<Node> },
    Endpoint { depth: usize, handler: BoxedHandler },
}

impl Node {
    pub(crate) fn call<'a>(
        &'a self,
        req: &'a mut Request,
        trace: &'a Trace,
    ) -> BoxFuture<'a, Result<Response, Fault>> {
        match self {
            Self::Filter { depth, layer, inner } => {
                trace.enter_filter(*depth);
                debug!(filter = layer.name(), depth = *depth, "entering filter");
                let next = Next { node: &**inner, caller: *depth, trace };
                layer.filter().handle(req, next)
            }
            Self::Endpoint { depth, handler } => {
                trace.enter_endpoint(*depth);
                debug!("entering endpoint");
                handler.call(req.clone())
            }
        }
    }
}

/// What happened during one execution. Entry is strictly sequential within a
/// request, so `entered` only ever grows by one and always describes a prefix
/// of the chain.
#[derive(Debug)]
pub(crate) struct Trace {
    entered: AtomicUsize,
    reached_endpoint: AtomicBool,
    /// Depth of the layer currently holding control.
    active: AtomicUsize,
}

impl Trace {
    pub(crate) fn new() -> Self {
        Self {
            entered: AtomicUsize::new(0),
            reached_endpoint: AtomicBool::new(false),
            active: AtomicUsize::new(0),
        }
    }

    fn enter_filter(&self, depth: usize) {
        self.entered.fetch_max(depth + 1, Ordering::Relaxed);
        self.active.store(depth, Ordering::Relaxed);
    }

    fn enter_endpoint(&self, depth: usize) {
        self.reached_endpoint.store(true, Ordering::Relaxed);
        self.active.store(depth, Ordering::Relaxed);
    }

    fn resume(&self, depth: usize) {
        self.active.store(depth, Ordering::Relaxed);
    }

    pub(crate) fn entered(&self) -> usize {
        self.entered.load(Ordering::Relaxed)
    }

    pub(crate) fn reached_endpoint(&self) -> bool {
        self.reached_endpoint.load(Ordering::Relaxed)
    }

    pub(crate) fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}

/// The rest of the chain, from the current filter inward.
///
/// Single use: [`run`](Next::run) takes `self`. Dropping it without running
/// is a short-circuit, and the filter must return its own response.
///
/// Delegating a second time is rejected at compile time:
///
/// ```compile_fail,E0382
/// use strata::{BoxFuture, Fault, Filter, Next, Request, Response};
///
/// struct Twice;
///
/// impl Filter for Twice {
///     fn handle<'a>(&'a self, req: &'a mut Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, Fault>> {
///         Box::pin(async move {
///             let _first = next.run(req).await;
///             next.run(req).await
///         })
///     }
/// }
/// ```
pub struct Next<'a> {
    node: &'a Node,
    caller: usize,
    trace: &'a Trace,
}

impl<'a> Next<'a> {
    /// Hands the request to the next filter (or the terminal handler) and
    /// resolves to whatever comes back out.
    pub fn run<'r>(self, req: &'r mut Request) -> BoxFuture<'r, Result<Response, Fault>>
    where
        'a: 'r,
    {
        Box::pin(async move {
            let outcome = self.node.call(req, self.trace).await;
            // Control is back in the caller's after-phase.
            self.trace.resume(self.caller);
            outcome
        })
    }
}
