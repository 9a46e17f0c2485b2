//! Minimal strata example: JSON endpoints, a nested router, and the
//! built-in middleware on the hyper server.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/
//!   curl http://localhost:3000/api/v1/users/42
//!   curl -X POST http://localhost:3000/api/v1/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -X DELETE http://localhost:3000/api/v1/users/42 -H 'authorization: Bearer demo'
//!   curl 'http://localhost:3000/search?q=rust&tag=web&tag=http'

use serde_json::json;
use strata::middleware::{
    Cors, Logging, RateLimit, RateLimitConfig, SecurityHeaders, Timing, require_auth,
};
use strata::{App, Error, HttpError, Request, Response, Router, Server};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let users = Router::new("/users")
        .get("/{id}", get_user)
        .post("", create_user)
        .delete("/{id}", delete_user)
        .layer(require_auth(|req: Request| async move {
            req.method() != "DELETE"
                || req.header("authorization").is_some_and(|v| v.starts_with("Bearer "))
        }));

    let v1 = Router::new("/v1").include(users, "");

    let app = App::new()
        .get("/", index)
        .get("/search", search)
        .include_router(v1, "/api")
        .add_middleware(Logging)
        .add_middleware(Timing)
        .add_middleware(SecurityHeaders::default())
        .add_middleware(Cors::default())
        .add_middleware(RateLimit::new(RateLimitConfig { max_requests: 30, window_seconds: 60 }));

    for (path, methods) in app.router().routes() {
        tracing::info!(%path, ?methods, "route");
    }

    Server::bind("0.0.0.0:3000")?.serve(app).await
}

// GET /
async fn index(_req: Request) -> Result<Response, Error> {
    Ok(Response::json(json!({ "message": "Hello from strata" })))
}

// GET /search?q=..&tag=..
async fn search(req: Request) -> Result<Response, Error> {
    let query = req.query_params();
    Ok(Response::json(json!({
        "q": query.get("q").and_then(|v| v.first()),
        "tags": query.get("tag").cloned().unwrap_or_default(),
    })))
}

// GET /api/v1/users/{id}
async fn get_user(req: Request) -> Result<Response, Error> {
    let id = req.path_param("id").unwrap_or_default();
    if id == "0" {
        return Err(HttpError::not_found(format!("User {id} not found")).into());
    }
    Ok(Response::json(json!({ "id": id, "name": "alice" })))
}

// POST /api/v1/users
async fn create_user(req: Request) -> Result<(u16, Response), Error> {
    let body = req.json().await?;
    let Some(name) = body.get("name").and_then(|n| n.as_str()) else {
        return Err(HttpError::bad_request("name is required").into());
    };
    let res = Response::builder()
        .header("location", "/api/v1/users/99")
        .body(json!({ "id": "99", "name": name }));
    Ok((201, res))
}

// DELETE /api/v1/users/{id} → 204 No Content
async fn delete_user(_req: Request) -> Result<Response, Error> {
    Ok(Response::empty(204))
}
