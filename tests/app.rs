//! End-to-end exchanges through `App::handle` and the in-memory gateway.

use std::collections::VecDeque;

use bytes::Bytes;
use serde_json::{Value, json};
use strata::gateway::{Chunk, Frame, Scope, ScopeKind};
use strata::middleware::{Cors, Hooks, RateLimit, RateLimitConfig, SecurityHeaders, Timing, require_auth};
use strata::{App, Error, HttpError, Method, Next, Request, Response, Router};

struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl Reply {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

async fn exchange(app: &App, scope: Scope, body: &[&'static str]) -> Reply {
    let mut source: VecDeque<Chunk> = body.iter().map(|b| Chunk::part(*b)).collect();
    source.push_back(Chunk::last(""));
    let mut frames = Vec::new();
    app.handle(scope, source, &mut frames).await.unwrap();

    assert_eq!(frames.len(), 2, "exactly two frames per exchange");
    let (Frame::Start { status, headers }, Frame::Body { bytes }) = (frames[0].clone(), frames[1].clone()) else {
        panic!("frames out of order: {frames:?}");
    };
    let headers = headers.into_iter()
        .map(|(k, v)| (String::from_utf8(k.to_vec()).unwrap(), String::from_utf8(v.to_vec()).unwrap()))
        .collect();
    Reply { status, headers, body: bytes }
}

async fn get(app: &App, path: &str) -> Reply {
    exchange(app, Scope::http("GET", path), &[]).await
}

async fn root(_: Request) -> Result<Response, Error> {
    Ok(Response::json(json!({"message": "Hello World"})))
}

async fn user(req: Request) -> Result<Value, Error> {
    Ok(json!({"user_id": req.path_param("id")}))
}

async fn user_post(req: Request) -> Result<Value, Error> {
    Ok(json!({"user_id": req.path_param("user_id"), "post_id": req.path_param("post_id")}))
}

#[tokio::test]
async fn simple_route() {
    let app = App::new().get("/", root);
    let reply = get(&app, "/").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("content-type"), Some("application/json"));
    assert_eq!(reply.json(), json!({"message": "Hello World"}));
}

#[tokio::test]
async fn path_parameters_are_bound() {
    let app = App::new()
        .get("/users/{id}", user)
        .get("/users/{user_id}/posts/{post_id}", user_post);

    assert_eq!(get(&app, "/users/123").await.json(), json!({"user_id": "123"}));
    assert_eq!(
        get(&app, "/users/123/posts/456").await.json(),
        json!({"user_id": "123", "post_id": "456"}),
    );
    assert_eq!(get(&app, "/users/123/comments/456").await.status, 404);
}

#[tokio::test]
async fn multiple_methods_on_one_path() {
    async fn items(req: Request) -> Result<String, Error> {
        Ok(format!("{} items", req.method()))
    }

    let app = App::new().route("/items", [Method::GET, Method::POST], items);
    assert_eq!(get(&app, "/items").await.body, "GET items");
    let posted = exchange(&app, Scope::http("POST", "/items"), &[]).await;
    assert_eq!(posted.body, "POST items");
    assert_eq!(posted.header("content-type"), Some("text/plain"));

    let put = exchange(&app, Scope::http("PUT", "/items"), &[]).await;
    assert_eq!(put.status, 404);
    assert_eq!(put.json(), json!({"error": "No route found for PUT /items"}));
}

#[tokio::test]
async fn not_found_message() {
    let reply = get(&App::new(), "/nonexistent").await;
    assert_eq!(reply.status, 404);
    assert_eq!(reply.json()["error"], "No route found for GET /nonexistent");
}

#[tokio::test]
async fn untyped_failure_becomes_500() {
    async fn failing(_: Request) -> Result<Response, Error> {
        Err(Error::msg("Test error"))
    }

    let reply = get(&App::new().get("/error", failing), "/error").await;
    assert_eq!(reply.status, 500);
    assert_eq!(reply.json(), json!({"error": "Internal Server Error", "detail": "Test error"}));
}

#[tokio::test]
async fn typed_failures_from_handler_and_middleware() {
    async fn missing(_: Request) -> Result<Response, Error> {
        Err(HttpError::not_found("Item not found").into())
    }

    let app = App::new().get("/missing", missing);
    let reply = get(&app, "/missing").await;
    assert_eq!(reply.status, 404);
    assert_eq!(reply.json(), json!({"error": "Item not found"}));

    let gated = App::new()
        .get("/", root)
        .add_middleware(require_auth(|req: Request| async move { req.header("authorization").is_some() }));
    let reply = get(&gated, "/").await;
    assert_eq!(reply.status, 401);
    assert_eq!(reply.json(), json!({"error": "Authentication required"}));
}

#[tokio::test]
async fn included_router_resolves_full_prefix() {
    let v1 = Router::new("/v1").get("/users", root);
    let api = Router::new("/api").include(v1, "");
    let app = App::new().include_router(api, "");

    assert_eq!(get(&app, "/api/v1/users").await.status, 200);
    assert_eq!(get(&app, "/v1/users").await.status, 404);
}

#[tokio::test]
async fn include_router_with_extra_prefix() {
    let users = Router::new("/users").get("/{id}", user);
    let app = App::new().include_router(users, "/api/v2");
    assert_eq!(get(&app, "/api/v2/users/7").await.json(), json!({"user_id": "7"}));
}

#[tokio::test]
async fn own_routes_win_over_included_ones() {
    async fn own(_: Request) -> Result<&'static str, Error> { Ok("own") }
    async fn included(_: Request) -> Result<&'static str, Error> { Ok("included") }

    let app = App::new()
        .get("/dup", own)
        .include_router(Router::default().get("/dup", included), "");
    assert_eq!(get(&app, "/dup").await.body, "own");
}

#[tokio::test]
async fn included_route_shadows_later_own_route() {
    async fn own(_: Request) -> Result<&'static str, Error> { Ok("own") }
    async fn included(_: Request) -> Result<&'static str, Error> { Ok("included") }

    let app = App::new()
        .include_router(Router::default().get("/dup", included), "")
        .get("/dup", own);
    assert_eq!(get(&app, "/dup").await.body, "included");
}

#[tokio::test]
async fn router_middleware_joins_app_chain() {
    let tagged = Router::new("/tagged")
        .get("", root)
        .layer(|req: Request, next: Next| async move {
            let mut res = next.run(req).await?;
            res.headers_mut().insert("X-Router", "tagged");
            Ok::<_, Error>(res)
        });
    let app = App::new().get("/plain", root).include_router(tagged, "");

    assert_eq!(get(&app, "/tagged").await.header("x-router"), Some("tagged"));
    // App-wide once included.
    assert_eq!(get(&app, "/plain").await.header("x-router"), Some("tagged"));
}

#[tokio::test]
async fn built_in_middleware_stack() {
    let app = App::new()
        .get("/", root)
        .add_middleware(Timing)
        .add_middleware(SecurityHeaders::new([("X-Frame-Options", "SAMEORIGIN")]))
        .add_middleware(Cors::default());

    let reply = exchange(&app, Scope::http("GET", "/").with_header("origin", "https://app.example"), &[]).await;
    assert_eq!(reply.status, 200);
    assert!(reply.header("x-process-time").is_some());
    assert_eq!(reply.header("x-frame-options"), Some("SAMEORIGIN"));
    assert_eq!(reply.header("x-content-type-options"), Some("nosniff"));
    assert_eq!(reply.header("access-control-allow-origin"), Some("https://app.example"));
}

#[tokio::test]
async fn preflight_needs_a_route() {
    let app = App::new().get("/", root).add_middleware(Cors::default());
    let reply = exchange(&app, Scope::http("OPTIONS", "/"), &[]).await;
    assert_eq!(reply.status, 404);
}

#[tokio::test]
async fn rate_limit_renders_429() {
    let app = App::new()
        .get("/", root)
        .add_middleware(RateLimit::new(RateLimitConfig { max_requests: 2, window_seconds: 60 }));

    let first = get(&app, "/").await;
    assert_eq!(first.header("x-ratelimit-remaining"), Some("1"));
    let second = get(&app, "/").await;
    assert_eq!(second.header("x-ratelimit-remaining"), Some("0"));

    let third = get(&app, "/").await;
    assert_eq!(third.status, 429);
    assert_eq!(third.json(), json!({"error": "Rate limit exceeded. Too many requests."}));
}

#[tokio::test]
async fn json_body_is_shared_with_middleware() {
    async fn echo(req: Request) -> Result<Value, Error> {
        req.json().await
    }

    let hooks = Hooks::new().before(|req: Request| async move {
        let body = req.json().await?;
        if body.get("name").is_none() {
            return Err(HttpError::bad_request("name is required").into());
        }
        Ok(())
    });
    let app = App::new().post("/echo", echo).add_middleware(hooks);

    let scope = Scope::http("POST", "/echo").with_header("content-type", "application/json");
    let reply = exchange(&app, scope.clone(), &[r#"{"na"#, r#"me":"alice"}"#]).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.json(), json!({"name": "alice"}));

    let reply = exchange(&app, scope, &["{}"]).await;
    assert_eq!(reply.status, 400);
}

#[tokio::test]
async fn bad_json_and_wrong_content_type_are_400() {
    async fn parse(req: Request) -> Result<Value, Error> {
        req.json().await
    }
    let app = App::new().post("/parse", parse);

    let json_scope = Scope::http("POST", "/parse").with_header("content-type", "application/json");
    let reply = exchange(&app, json_scope, &["invalid json"]).await;
    assert_eq!(reply.status, 400);
    assert!(reply.json()["error"].as_str().unwrap().starts_with("Invalid JSON"));

    let text_scope = Scope::http("POST", "/parse").with_header("content-type", "text/plain");
    let reply = exchange(&app, text_scope, &["{}"]).await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.json(), json!({"error": "Content-Type must be application/json"}));
}

#[tokio::test]
async fn form_and_query_parsing() {
    async fn both(req: Request) -> Result<Value, Error> {
        let form = req.form().await?;
        Ok(json!({"form": form, "query": req.query_params()}))
    }
    let app = App::new().post("/submit", both);

    let scope = Scope::http("POST", "/submit")
        .with_query("page=2&tag=a&tag=b")
        .with_header("content-type", "application/x-www-form-urlencoded");
    let reply = exchange(&app, scope, &["name=John+Doe&email=john%40example.com"]).await;
    assert_eq!(reply.json(), json!({
        "form": {"name": ["John Doe"], "email": ["john@example.com"]},
        "query": {"page": ["2"], "tag": ["a", "b"]},
    }));
}

#[tokio::test]
async fn non_http_scopes_are_ignored() {
    let app = App::new().get("/", root);
    for kind in [ScopeKind::WebSocket, ScopeKind::Lifespan] {
        let mut scope = Scope::http("GET", "/");
        scope.kind = kind;
        let mut frames: Vec<Frame> = Vec::new();
        app.handle(scope, VecDeque::new(), &mut frames).await.unwrap();
        assert!(frames.is_empty());
    }
}

#[tokio::test]
async fn concurrent_exchanges_share_one_app() {
    let app = std::sync::Arc::new(App::new().get("/users/{id}", user));
    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..20 {
        let app = std::sync::Arc::clone(&app);
        tasks.spawn(async move {
            let reply = get(&app, &format!("/users/{i}")).await;
            (i, reply.json())
        });
    }
    while let Some(joined) = tasks.join_next().await {
        let (i, body) = joined.unwrap();
        assert_eq!(body, json!({"user_id": i.to_string()}));
    }
}
