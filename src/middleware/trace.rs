//! Request logging.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::Fault;
use crate::filter::{BoxFuture, Filter, Layer, Terminable};
use crate::pipeline::Next;
use crate::request::Request;
use crate::response::Response;

/// Logs one line per request after the response has been delivered.
///
/// The before-phase stamps the request with [`Started`]; the log line is
/// written from `terminate`, so slow log sinks never hold up the client.
/// Register it first so the latency covers every other filter.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

/// When [`Trace`] first saw the request.
#[derive(Clone, Copy, Debug)]
pub struct Started(pub Instant);

impl Trace {
    /// The terminable layer for this filter.
    pub fn layer() -> Layer {
        Layer::terminable(Self)
    }
}

impl Filter for Trace {
    fn handle<'a>(&'a self, req: &'a mut Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, Fault>> {
        req.attributes_mut().insert(Started(Instant::now()));
        next.run(req)
    }

    fn name(&self) -> &str { "trace" }
}

impl Terminable for Trace {
    fn terminate<'a>(&'a self, req: &'a Request, res: &'a Response) -> BoxFuture<'a, Result<(), Fault>> {
        Box::pin(async move {
            let latency = req.attributes().get::<Started>()
                .map_or(Duration::ZERO, |started| started.0.elapsed());
            let status = res.status_code().as_u16();

            if res.status_code().is_server_error() {
                warn!(method = %req.method(), path = req.path(), status, ?latency, "request failed");
            } else {
                info!(method = %req.method(), path = req.path(), status, ?latency, "request served");
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;
    use crate::pipeline::{Chain, Pipeline};

    async fn echo(req: Request) -> String {
        req.path().to_owned()
    }

    #[tokio::test]
    async fn stamps_the_request_and_terminates() {
        let pipeline = Pipeline::build(echo, Chain::new(vec![Trace::layer()]));
        let exec = pipeline.execute(Request::new(Method::GET, "/hello")).await;

        assert!(exec.request().attributes().get::<Started>().is_some());

        let (res, termination) = exec.respond(|_| unreachable!());
        assert_eq!(res.body().as_ref(), b"/hello");

        let report = termination.run().await;
        assert_eq!(report.invoked, ["trace"]);
        assert!(report.is_clean());
    }
}
