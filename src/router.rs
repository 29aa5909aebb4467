//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. Each route names the
//! filters it opts into; [`Router::compile`] resolves them against a
//! [`Registry`] once, at startup, and folds every route into its own
//! [`Pipeline`].

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::app::App;
use crate::error::Error;
use crate::handler::{self, BoxedHandler, Handler};
use crate::pipeline::Pipeline;
use crate::registry::Registry;

// ── Route ─────────────────────────────────────────────────────────────────────

/// One method + path pair, its handler, and the filters it opts into.
///
/// ```rust
/// # use strata::{Request, Route, Method};
/// # async fn dashboard(_: Request) -> &'static str { "" }
/// Route::new(Method::GET, "/admin", dashboard)
///     .with(["web", "auth"])
///     .without(["csrf"]);
/// ```
pub struct Route {
    method: Method,
    path: String,
    handler: BoxedHandler,
    keys: Vec<String>,
    excluded: Vec<String>,
}

impl Route {
    pub fn new(method: Method, path: &str, handler: impl Handler) -> Self {
        Self {
            method,
            path: path.to_owned(),
            handler: handler.into_boxed_handler(),
            keys: Vec::new(),
            excluded: Vec::new(),
        }
    }

    /// Appends filter keys (or group names), innermost last.
    pub fn with<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Removes filters (global or keyed, or a whole group) from this route.
    pub fn without<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(keys.into_iter().map(Into::into));
        self
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// The application router.
///
/// Build it once at startup, then [`compile`](Router::compile) it against the
/// filter registry. Each registration returns `self` so calls chain naturally.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a method + path pair with only the global filters.
    ///
    /// Path parameters use `{name}` syntax: `req.param("name")` retrieves them.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.route(Route::new(method, path, handler))
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Resolves every route's chain and builds its pipeline.
    ///
    /// Fails on the first unknown filter key or invalid path, before anything
    /// is served.
    pub fn compile(self, registry: &Registry) -> Result<App, Error> {
        let mut trees: HashMap<Method, MatchitRouter<Arc<Pipeline>>> = HashMap::new();

        for route in self.routes {
            let chain = registry.chain_excluding(&route.keys, &route.excluded)?;
            debug!(method = %route.method, path = %route.path, filters = ?chain.names(), "compiled route");

            let pipeline = Arc::new(Pipeline::from_boxed(route.handler, chain));
            trees
                .entry(route.method)
                .or_default()
                .insert(route.path.clone(), pipeline)
                .map_err(|source| Error::Route { path: route.path, source })?;
        }

        let fallback = Pipeline::build(handler::not_found, registry.chain(std::iter::empty::<&str>())?);
        Ok(App::new(trees, Arc::new(fallback)))
    }
}
