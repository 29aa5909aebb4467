//! Building and running the filter chain for one route.
//!
//! ```text
//!            ┌──────── f0 ────────┐
//!  request → │ before  ┌── f1 ──┐ │
//!            │         │ before │ │
//!            │         │endpoint│ │
//!            │         │ after  │ │
//!  response ←│ after   └────────┘ │
//!            └────────────────────┘
//!  then, once the response is out:  terminate(f0), terminate(f1)
//! ```
//!
//! Entry runs outermost-first, unwind runs in reverse, and termination runs in
//! entry order again: hooks are independent flushes, not nested decorations.

mod next;
pub mod terminate;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{Instrument, debug, debug_span, error};

use crate::error::{ContractViolation, PipelineFault, panic_message};
use crate::filter::Layer;
use crate::handler::{BoxedHandler, Handler};
use crate::request::Request;
use crate::response::Response;

use self::next::{Node, Trace};
use self::terminate::Termination;

pub use self::next::Next;

// ── Chain ─────────────────────────────────────────────────────────────────────

/// An ordered, immutable list of resolved layers. Cloning is cheap.
#[derive(Clone, Debug)]
pub struct Chain {
    layers: Arc<[Layer]>,
    len: usize,
}

impl Chain {
    pub fn new(layers: Vec<Layer>) -> Self {
        let len = layers.len();
        Self { layers: layers.into(), len }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers[..self.len]
    }

    pub fn len(&self) -> usize { self.len }
    pub fn is_empty(&self) -> bool { self.len == 0 }

    pub fn names(&self) -> Vec<&str> {
        self.layers().iter().map(Layer::name).collect()
    }

    /// The first `len` layers, sharing storage with `self`.
    pub(crate) fn prefix(&self, len: usize) -> Self {
        Self { layers: Arc::clone(&self.layers), len: len.min(self.len) }
    }
}

impl FromIterator<Layer> for Chain {
    fn from_iter<I: IntoIterator<Item = Layer>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// A chain folded around its terminal handler, ready to execute.
///
/// Built once per route at startup and shared by every request on that route.
pub struct Pipeline {
    chain: Chain,
    root: Node,
}

impl Pipeline {
    /// Folds `chain` around `terminal`, last layer first, so the first layer
    /// ends up outermost: `f0(f1(…fn(terminal)))`.
    pub fn build(terminal: impl Handler, chain: Chain) -> Self {
        Self::from_boxed(terminal.into_boxed_handler(), chain)
    }

    pub(crate) fn from_boxed(terminal: BoxedHandler, chain: Chain) -> Self {
        let endpoint = Node::Endpoint { depth: chain.len(), handler: terminal };
        let root = chain.layers().iter().enumerate().rev().fold(endpoint, |inner, (depth, layer)| {
            Node::Filter { depth, layer: layer.clone(), inner: Box::new(inner) }
        });
        Self { chain, root }
    }

    pub fn chain(&self) -> &Chain { &self.chain }

    /// Runs the chain once for `req`.
    ///
    /// Never fails outright: the outcome, the request (with whatever filters
    /// attached to it) and the layers that were entered all come back in the
    /// [`Execution`], so termination can run even when the outcome is a fault.
    pub async fn execute(&self, mut req: Request) -> Execution {
        let span = debug_span!("pipeline", method = %req.method(), path = %req.path());
        let trace = Trace::new();

        // The root call sits inside the async block so a filter that panics
        // before returning its future is caught too.
        let outcome = AssertUnwindSafe(async { self.root.call(&mut req, &trace).await })
            .catch_unwind()
            .instrument(span)
            .await;

        let outcome = match outcome {
            Ok(Ok(res)) => Ok(res),
            Ok(Err(cause)) => {
                error!(error = %cause, "fault escaped the outermost filter");
                Err(PipelineFault::Unhandled(cause))
            }
            Err(payload) => {
                let violation = ContractViolation {
                    layer: self.layer_name(trace.active()),
                    message: panic_message(&*payload),
                };
                error!(layer = %violation.layer, "{violation}");
                Err(PipelineFault::Contract(violation))
            }
        };

        let entered = self.chain.prefix(trace.entered());
        debug!(entered = entered.len(), of = self.chain.len(), "pipeline finished");

        Execution {
            request: req,
            outcome,
            entered,
            reached_endpoint: trace.reached_endpoint(),
        }
    }

    fn layer_name(&self, depth: usize) -> String {
        match self.chain.layers().get(depth) {
            Some(layer) => layer.name().to_owned(),
            None => "endpoint".to_owned(),
        }
    }
}

// ── Execution ─────────────────────────────────────────────────────────────────

/// The result of one [`Pipeline::execute`] call.
#[derive(Debug)]
pub struct Execution {
    request: Request,
    outcome: Result<Response, PipelineFault>,
    entered: Chain,
    reached_endpoint: bool,
}

impl Execution {
    pub fn outcome(&self) -> &Result<Response, PipelineFault> { &self.outcome }

    /// Layers whose `handle` was entered, in entry order. Always a prefix of
    /// the pipeline's chain.
    pub fn entered(&self) -> &Chain { &self.entered }

    /// `false` when a filter short-circuited or faulted before the endpoint.
    pub fn reached_endpoint(&self) -> bool { self.reached_endpoint }

    pub fn request(&self) -> &Request { &self.request }

    /// Settles on the response to deliver, mapping a fault through
    /// `on_fault`, and hands back the termination pass to run once it is sent.
    pub fn respond(self, on_fault: impl FnOnce(&PipelineFault) -> Response) -> (Response, Termination) {
        let response = match &self.outcome {
            Ok(res) => res.clone(),
            Err(fault) => on_fault(fault),
        };
        let termination = Termination::new(self.entered, self.request, response.clone());
        (response, termination)
    }

    pub fn into_parts(self) -> (Request, Result<Response, PipelineFault>, Chain) {
        (self.request, self.outcome, self.entered)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::{Method, StatusCode};

    use super::*;
    use crate::error::Fault;
    use crate::filter::{BoxFuture, Filter};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Probe {
        name: &'static str,
        log: Log,
    }

    impl Filter for Probe {
        fn handle<'a>(&'a self, req: &'a mut Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, Fault>> {
            Box::pin(async move {
                self.log.lock().unwrap().push(format!("{} in", self.name));
                let res = next.run(req).await;
                self.log.lock().unwrap().push(format!("{} out", self.name));
                res
            })
        }

        fn name(&self) -> &str { self.name }
    }

    struct Panics;

    impl Filter for Panics {
        fn handle<'a>(&'a self, _req: &'a mut Request, _next: Next<'a>) -> BoxFuture<'a, Result<Response, Fault>> {
            panic!("filter bug")
        }

        fn name(&self) -> &str { "panics" }
    }

    async fn ok(_req: Request) -> &'static str {
        "ok"
    }

    fn probe(name: &'static str, log: &Log) -> Layer {
        Layer::new(Probe { name, log: Arc::clone(log) })
    }

    #[tokio::test]
    async fn build_nests_first_layer_outermost() {
        let log = Log::default();
        let pipeline = Pipeline::build(ok, Chain::new(vec![probe("a", &log), probe("b", &log)]));

        let exec = pipeline.execute(Request::new(Method::GET, "/")).await;

        assert!(exec.outcome().is_ok());
        assert!(exec.reached_endpoint());
        assert_eq!(*log.lock().unwrap(), ["a in", "b in", "b out", "a out"]);
        assert_eq!(exec.entered().names(), ["a", "b"]);
    }

    #[tokio::test]
    async fn empty_chain_runs_the_endpoint_alone() {
        let pipeline = Pipeline::build(ok, Chain::new(Vec::new()));
        let exec = pipeline.execute(Request::new(Method::GET, "/")).await;

        assert!(exec.entered().is_empty());
        let res = exec.outcome().as_ref().unwrap();
        assert_eq!(res.body().as_ref(), b"ok");
    }

    #[tokio::test]
    async fn panic_becomes_contract_violation_naming_the_layer() {
        let log = Log::default();
        let pipeline = Pipeline::build(ok, Chain::new(vec![probe("outer", &log), Layer::new(Panics)]));

        let exec = pipeline.execute(Request::new(Method::GET, "/")).await;

        match exec.outcome() {
            Err(PipelineFault::Contract(v)) => {
                assert_eq!(v.layer, "panics");
                assert_eq!(v.message, "filter bug");
            }
            other => panic!("expected contract violation, got {other:?}"),
        }
        // The outer filter never got its after-phase.
        assert_eq!(*log.lock().unwrap(), ["outer in"]);
        assert_eq!(exec.entered().names(), ["outer", "panics"]);
    }

    #[tokio::test]
    async fn panic_in_the_outermost_filter_is_caught() {
        let pipeline = Pipeline::build(ok, Chain::new(vec![Layer::new(Panics)]));
        let exec = pipeline.execute(Request::new(Method::GET, "/")).await;

        assert!(exec.outcome().as_ref().is_err_and(PipelineFault::is_contract_violation));
        assert_eq!(exec.entered().names(), ["panics"]);
    }

    #[tokio::test]
    async fn panicking_endpoint_is_attributed_to_the_endpoint() {
        async fn explode(_req: Request) -> StatusCode {
            panic!("handler bug")
        }

        let pipeline = Pipeline::build(explode, Chain::new(Vec::new()));
        let exec = pipeline.execute(Request::new(Method::GET, "/")).await;

        match exec.outcome() {
            Err(PipelineFault::Contract(v)) => assert_eq!(v.layer, "endpoint"),
            other => panic!("expected contract violation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn respond_maps_faults_and_keeps_the_request() {
        async fn fail(_req: Request) -> Result<Response, Fault> {
            Err(Fault::msg("db down"))
        }

        let pipeline = Pipeline::build(fail, Chain::new(Vec::new()));
        let exec = pipeline.execute(Request::new(Method::GET, "/orders")).await;
        assert!(matches!(exec.outcome(), Err(PipelineFault::Unhandled(_))));
        assert_eq!(exec.request().path(), "/orders");

        let (res, _termination) = exec.respond(|_| Response::status(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn prefix_shares_storage_and_clamps() {
        let log = Log::default();
        let chain = Chain::new(vec![probe("a", &log), probe("b", &log)]);
        assert_eq!(chain.prefix(1).names(), ["a"]);
        assert_eq!(chain.prefix(9).len(), 2);
    }
}
