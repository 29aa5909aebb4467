//! Response header injection.

use crate::error::Fault;
use crate::filter::{BoxFuture, Filter};
use crate::pipeline::Next;
use crate::request::Request;
use crate::response::Response;

/// Sets a fixed header on every response that passes back through it,
/// including responses produced by filters further in that short-circuit.
#[derive(Clone, Debug)]
pub struct SetHeader {
    name: String,
    value: String,
}

impl SetHeader {
    pub fn new(name: &str, value: &str) -> Self {
        Self { name: name.to_owned(), value: value.to_owned() }
    }
}

impl Filter for SetHeader {
    fn handle<'a>(&'a self, req: &'a mut Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, Fault>> {
        Box::pin(async move {
            let mut res = next.run(req).await?;
            res.set_header(&self.name, &self.value);
            Ok(res)
        })
    }

    fn name(&self) -> &str { "set-header" }
}

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};

    use super::*;
    use crate::filter::Layer;
    use crate::pipeline::{Chain, Pipeline};

    struct Deny;

    impl Filter for Deny {
        fn handle<'a>(&'a self, _req: &'a mut Request, _next: Next<'a>) -> BoxFuture<'a, Result<Response, Fault>> {
            Box::pin(async { Ok(Response::status(StatusCode::FORBIDDEN)) })
        }
    }

    async fn never(_req: Request) -> &'static str {
        unreachable!("short-circuited")
    }

    #[tokio::test]
    async fn decorates_short_circuited_responses() {
        let chain = Chain::new(vec![
            Layer::new(SetHeader::new("x-frame-options", "DENY")),
            Layer::new(Deny),
        ]);
        let exec = Pipeline::build(never, chain).execute(Request::new(Method::GET, "/")).await;

        let res = exec.outcome().as_ref().unwrap();
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(res.header("x-frame-options"), Some("DENY"));
        assert!(!exec.reached_endpoint());
    }
}
