//! Minimal strata example: a global trace filter, a keyed auth filter, and
//! a route group.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/42
//!   curl -i -X POST http://localhost:3000/users -d '{"name":"alice"}'
//!   curl -i -X POST http://localhost:3000/users -H 'authorization: Bearer t' -d '{"name":"alice"}'
//!   curl -i http://localhost:3000/missing

use strata::middleware::{SetHeader, Trace};
use tracing_subscriber::EnvFilter;
use strata::{
    BoxFuture, Fault, Filter, Method, Next, Registry, Request, Response, Route, Router, Server,
    StatusCode,
};

/// Who made the request, as established by [`Auth`].
#[derive(Clone, Debug)]
struct Caller(String);

/// Rejects requests without a bearer token; attaches the caller otherwise.
struct Auth;

impl Filter for Auth {
    fn handle<'a>(&'a self, req: &'a mut Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, Fault>> {
        Box::pin(async move {
            let Some(token) = req.header("authorization").and_then(|v| v.strip_prefix("Bearer ")) else {
                return Ok(Response::status(StatusCode::UNAUTHORIZED));
            };
            let caller = Caller(token.to_owned());
            req.attributes_mut().insert(caller);
            next.run(req).await
        })
    }

    fn name(&self) -> &str { "auth" }
}

#[tokio::main]
async fn main() -> Result<(), strata::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let registry = Registry::builder()
        .strict(true)
        .register_global(Trace::layer())
        .register_global(SetHeader::new("x-content-type-options", "nosniff"))
        .register_keyed("auth", Auth)?
        .register_keyed("no-store", SetHeader::new("cache-control", "no-store"))?
        .register_group("api-write", ["auth", "no-store"])?
        .build();

    let app = Router::new()
        .on(Method::GET, "/users/{id}", get_user)
        .route(Route::new(Method::POST, "/users", create_user).with(["api-write"]))
        .compile(&registry)?;

    Server::bind("0.0.0.0:3000").serve(app).await
}

// GET /users/{id}
async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#))
}

// POST /users, behind `auth`, so `Caller` is always present.
async fn create_user(req: Request) -> Result<Response, Fault> {
    if req.body().is_empty() {
        return Ok(Response::status(StatusCode::BAD_REQUEST));
    }
    let caller = req.attributes().get::<Caller>()
        .ok_or_else(|| Fault::msg("auth filter did not run"))?;

    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/users/99")
        .header("x-created-by", &caller.0)
        .json(r#"{"id":"99","name":"new_user"}"#))
}
