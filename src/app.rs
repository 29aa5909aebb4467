//! A compiled router: one ready pipeline per route.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::pipeline::Pipeline;
use crate::pipeline::terminate::Termination;
use crate::request::Request;
use crate::response::Response;

/// The serving-phase application, produced by
/// [`Router::compile`](crate::Router::compile).
///
/// Immutable and cheap to share: every connection task holds an `Arc<App>`.
pub struct App {
    routes: HashMap<Method, MatchitRouter<Arc<Pipeline>>>,
    fallback: Arc<Pipeline>,
}

impl App {
    pub(crate) fn new(routes: HashMap<Method, MatchitRouter<Arc<Pipeline>>>, fallback: Arc<Pipeline>) -> Self {
        Self { routes, fallback }
    }

    /// Finds the pipeline for `method` + `path`. Unmatched requests get the
    /// global filters around a `404` endpoint.
    pub fn lookup(&self, method: &Method, path: &str) -> (Arc<Pipeline>, HashMap<String, String>) {
        let matched = self.routes.get(method).and_then(|tree| tree.at(path).ok());
        match matched {
            Some(matched) => {
                let params = matched.params.iter()
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect();
                (Arc::clone(matched.value), params)
            }
            None => (Arc::clone(&self.fallback), HashMap::new()),
        }
    }

    /// Runs one request through its pipeline.
    ///
    /// Returns the response to deliver and the termination pass, which the
    /// caller runs once the response is on its way. A pipeline fault is
    /// answered with `500 Internal Server Error`.
    pub async fn handle(&self, mut req: Request) -> (Response, Termination) {
        let (pipeline, params) = self.lookup(req.method(), req.path());
        req.set_params(params);

        pipeline
            .execute(req)
            .await
            .respond(|_| Response::status(StatusCode::INTERNAL_SERVER_ERROR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::router::{Route, Router};

    async fn show(req: Request) -> String {
        format!("user {}", req.param("id").unwrap_or("?"))
    }

    #[tokio::test]
    async fn matched_routes_receive_params() {
        let app = Router::new()
            .on(Method::GET, "/users/{id}", show)
            .compile(&Registry::builder().build())
            .unwrap();

        let (res, _) = app.handle(Request::new(Method::GET, "/users/42")).await;
        assert_eq!(res.body().as_ref(), b"user 42");
    }

    #[tokio::test]
    async fn unmatched_requests_get_404() {
        let app = Router::new().compile(&Registry::builder().build()).unwrap();

        let (res, termination) = app.handle(Request::new(Method::GET, "/nowhere")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert!(termination.run().await.invoked.is_empty());
    }

    #[test]
    fn unknown_route_keys_fail_compilation() {
        let result = Router::new()
            .route(Route::new(Method::GET, "/admin", show).with(["auth"]))
            .compile(&Registry::builder().build());

        assert!(matches!(
            result,
            Err(crate::Error::Registry(crate::RegistryError::UnknownFilterKey(ref key))) if key == "auth"
        ));
    }

    #[test]
    fn conflicting_paths_fail_compilation() {
        let result = Router::new()
            .on(Method::GET, "/users/{id}", show)
            .on(Method::GET, "/users/{name}", show)
            .compile(&Registry::builder().build());

        assert!(matches!(result, Err(crate::Error::Route { .. })));
    }
}
