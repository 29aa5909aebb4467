//! Post-response termination pass.
//!
//! Runs after the response has left, so nothing here may touch it. Each hook
//! is isolated: a failure or panic in one is recorded and the next hook still
//! runs.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, error};

use crate::error::{Fault, TerminationFailure, panic_message};
use crate::pipeline::Chain;
use crate::request::Request;
use crate::response::Response;

/// Everything the termination pass needs, detached from the request task so
/// the host can run it after delivery.
#[derive(Debug)]
pub struct Termination {
    entered: Chain,
    request: Request,
    response: Response,
}

impl Termination {
    pub fn new(entered: Chain, request: Request, response: Response) -> Self {
        Self { entered, request, response }
    }

    /// The response the hooks will observe.
    pub fn response(&self) -> &Response { &self.response }

    pub async fn run(self) -> TerminationReport {
        dispatch(&self.entered, &self.request, &self.response).await
    }
}

/// Outcome of one termination pass.
#[derive(Debug, Default)]
pub struct TerminationReport {
    /// Layers whose hook was invoked, in invocation order.
    pub invoked: Vec<String>,
    pub failures: Vec<TerminationFailure>,
}

impl TerminationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Invokes `terminate` on every terminable layer in `entered`, outermost first.
pub async fn dispatch(entered: &Chain, req: &Request, res: &Response) -> TerminationReport {
    let mut report = TerminationReport::default();

    for layer in entered.layers() {
        let Some(hook) = layer.hook() else { continue };
        report.invoked.push(layer.name().to_owned());

        let fault = match AssertUnwindSafe(hook.terminate(req, res)).catch_unwind().await {
            Ok(Ok(())) => continue,
            Ok(Err(fault)) => fault,
            Err(payload) => Fault::msg(format!("panicked: {}", panic_message(&*payload))),
        };

        error!(filter = layer.name(), error = %fault, "terminate hook failed");
        report.failures.push(TerminationFailure { layer: layer.name().to_owned(), fault });
    }

    debug!(invoked = report.invoked.len(), failed = report.failures.len(), "termination finished");
    report
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use http::Method;

    use super::*;
    use crate::filter::{BoxFuture, Filter, Layer, Terminable};
    use crate::pipeline::Next;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    struct Hook {
        name: &'static str,
        fail: bool,
        log: Log,
    }

    impl Filter for Hook {
        fn handle<'a>(&'a self, req: &'a mut Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, Fault>> {
            next.run(req)
        }

        fn name(&self) -> &str { self.name }
    }

    impl Terminable for Hook {
        fn terminate<'a>(&'a self, _req: &'a Request, _res: &'a Response) -> BoxFuture<'a, Result<(), Fault>> {
            Box::pin(async move {
                self.log.lock().unwrap().push(self.name);
                if self.fail {
                    return Err(Fault::msg("flush failed"));
                }
                Ok(())
            })
        }
    }

    struct Plain;

    impl Filter for Plain {
        fn handle<'a>(&'a self, req: &'a mut Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, Fault>> {
            next.run(req)
        }
    }

    fn hook(name: &'static str, fail: bool, log: &Log) -> Layer {
        Layer::terminable(Hook { name, fail, log: Arc::clone(log) })
    }

    #[tokio::test]
    async fn failures_do_not_stop_later_hooks() {
        let log = Log::default();
        let entered = Chain::new(vec![
            hook("first", true, &log),
            Layer::new(Plain),
            hook("second", false, &log),
        ]);

        let report = dispatch(&entered, &Request::new(Method::GET, "/"), &Response::text("ok")).await;

        assert_eq!(*log.lock().unwrap(), ["first", "second"]);
        assert_eq!(report.invoked, ["first", "second"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].layer, "first");
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn forward_only_layers_are_skipped() {
        let entered = Chain::new(vec![Layer::new(Plain)]);
        let report = dispatch(&entered, &Request::new(Method::GET, "/"), &Response::text("ok")).await;

        assert!(report.invoked.is_empty());
        assert!(report.is_clean());
    }
}
