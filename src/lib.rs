//! # strata
//!
//! A minimal HTTP framework for Rust services behind a reverse proxy, built
//! around one idea: a request passes through an ordered stack of filters on
//! its way to the handler, and back out through the same stack in reverse.
//!
//! ## The pipeline
//!
//! - **Filters** wrap the rest of the chain. Code before `next.run(req)` runs
//!   on the way in, code after it on the way out. Returning without calling
//!   `next` short-circuits: nothing further in runs, but everything further
//!   out still sees the response.
//! - **Faults** are plain `Result`s. A fault from further in surfaces at the
//!   enclosing `next.run(..)` call, where a filter can turn it into a
//!   response or let it keep going. If it escapes, the client gets a `500`.
//! - **Termination hooks** run after the response is delivered, for every
//!   filter that was entered, outermost first. A failing hook is logged and
//!   the next one still runs.
//!
//! The [`Registry`] decides the order: global filters wrap everything, in
//! registration order; routes then opt into keyed filters (or groups of them)
//! by name.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use strata::{BoxFuture, Fault, Filter, Method, Next, Registry, Request, Response, Route,
//!              Router, Server, StatusCode, middleware::Trace};
//!
//! struct Auth;
//!
//! impl Filter for Auth {
//!     fn handle<'a>(&'a self, req: &'a mut Request, next: Next<'a>)
//!         -> BoxFuture<'a, Result<Response, Fault>>
//!     {
//!         Box::pin(async move {
//!             if req.header("authorization").is_none() {
//!                 return Ok(Response::status(StatusCode::UNAUTHORIZED));
//!             }
//!             next.run(req).await
//!         })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), strata::Error> {
//!     let registry = Registry::builder()
//!         .register_global(Trace::layer())
//!         .register_keyed("auth", Auth)?
//!         .build();
//!
//!     let app = Router::new()
//!         .on(Method::GET, "/users/{id}", get_user)
//!         .route(Route::new(Method::POST, "/users", create_user).with(["auth"]))
//!         .compile(&registry)?;
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#))
//! }
//!
//! async fn create_user(req: Request) -> Result<Response, Fault> {
//!     if req.body().is_empty() {
//!         return Ok(Response::status(StatusCode::BAD_REQUEST));
//!     }
//!     Ok(Response::builder()
//!         .status(StatusCode::CREATED)
//!         .header("location", "/users/99")
//!         .json(r#"{"id":"99"}"#))
//! }
//! ```

mod app;
mod error;
mod filter;
mod handler;
mod registry;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;
pub mod pipeline;

pub use app::App;
pub use error::{ContractViolation, Error, Fault, PipelineFault, RegistryError, TerminationFailure};
pub use filter::{BoxFuture, Filter, Layer, Terminable};
pub use handler::{Handler, IntoOutcome};
pub use http::{Method, StatusCode};
pub use pipeline::terminate::{Termination, TerminationReport};
pub use pipeline::{Chain, Execution, Next, Pipeline};
pub use registry::{Registry, RegistryBuilder};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::{Route, Router};
pub use server::Server;
