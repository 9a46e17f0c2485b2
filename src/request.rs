//! Incoming HTTP request type.
//!
//! The head (method, path, raw query, raw header pairs) is fixed when the
//! gateway delivers the exchange. The body is *not* read up front: the first
//! call to [`Request::body`], [`Request::json`] or [`Request::form`] drains
//! the gateway's chunk stream, and every later call is served from a cache.
//!
//! `Request` is cheap to clone. Clones share the head, the body stream and
//! the three caches, so a middleware that peeks at the body does not leave
//! the handler with an empty stream. Path parameters are per-clone.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{Error, HttpError};
use crate::gateway::{ChunkSource, Scope};

/// Decoded URL-encoded data: every key maps to all of its values, in order.
pub type QueryMap = HashMap<String, Vec<String>>;

const JSON: &str = "application/json";
const FORM: &str = "application/x-www-form-urlencoded";

/// An incoming HTTP request.
#[derive(Clone)]
pub struct Request {
    head: Arc<Head>,
    path_params: HashMap<String, String>,
    body: Arc<Mutex<BodyState>>,
}

struct Head {
    method: String,
    path: String,
    raw_query: Bytes,
    headers: Vec<(Bytes, Bytes)>,
    client: Option<SocketAddr>,
}

struct BodyState {
    source: Option<Box<dyn ChunkSource>>,
    limit: Option<usize>,
    raw: Option<Bytes>,
    json: Option<Value>,
    form: Option<QueryMap>,
    failure: Option<BodyFailure>,
}

/// A drain that failed once fails the same way on every later read.
#[derive(Clone)]
enum BodyFailure {
    TooLarge(HttpError),
    Stream(String),
}

impl BodyFailure {
    fn to_error(&self) -> Error {
        match self {
            Self::TooLarge(e) => Error::Http(e.clone()),
            Self::Stream(m) => Error::Gateway(m.clone()),
        }
    }
}

impl BodyState {
    async fn read(&mut self) -> Result<Bytes, Error> {
        if let Some(raw) = &self.raw {
            return Ok(raw.clone());
        }
        if let Some(failure) = &self.failure {
            return Err(failure.to_error());
        }

        let mut buf = BytesMut::new();
        if let Some(mut source) = self.source.take() {
            loop {
                let chunk = match source.receive().await {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        self.failure = Some(BodyFailure::Stream(e.to_string()));
                        return Err(e);
                    }
                };
                if self.limit.is_some_and(|limit| buf.len() + chunk.bytes.len() > limit) {
                    let limit = self.limit.unwrap_or_default();
                    let err = HttpError::payload_too_large(format!(
                        "Request body exceeds {limit} bytes"
                    ));
                    self.failure = Some(BodyFailure::TooLarge(err.clone()));
                    return Err(err.into());
                }
                buf.extend_from_slice(&chunk.bytes);
                if !chunk.more {
                    break;
                }
            }
        }

        let raw = buf.freeze();
        self.raw = Some(raw.clone());
        Ok(raw)
    }
}

impl Request {
    /// A request whose body is drained from `source` without a size cap.
    pub fn new(scope: Scope, source: impl ChunkSource) -> Self {
        Self::bounded(scope, source, None)
    }

    /// A request whose body drain fails with `413` past `max_body_bytes`.
    pub fn bounded(scope: Scope, source: impl ChunkSource, max_body_bytes: Option<usize>) -> Self {
        let head = Head {
            method: scope.method,
            path: scope.path,
            raw_query: scope.raw_query,
            headers: scope.headers,
            client: scope.client,
        };
        let body = BodyState {
            source: Some(Box::new(source)),
            limit: max_body_bytes,
            raw: None,
            json: None,
            form: None,
            failure: None,
        };
        Self {
            head: Arc::new(head),
            path_params: HashMap::new(),
            body: Arc::new(Mutex::new(body)),
        }
    }

    pub fn method(&self) -> &str { &self.head.method }
    pub fn path(&self) -> &str { &self.head.path }
    pub fn raw_query(&self) -> &[u8] { &self.head.raw_query }
    pub fn raw_headers(&self) -> &[(Bytes, Bytes)] { &self.head.headers }

    /// Transport-reported peer address.
    pub fn client(&self) -> Option<SocketAddr> { self.head.client }

    /// Query string parameters, decoded on every call.
    pub fn query_params(&self) -> QueryMap {
        parse_urlencoded(&self.head.raw_query)
    }

    /// Header pairs decoded into a plain map, on every call.
    ///
    /// Keys keep the casing the gateway delivered (conventionally lowercase).
    /// When a name repeats, the last value wins.
    pub fn headers(&self) -> HashMap<String, String> {
        self.head.headers.iter()
            .map(|(k, v)| (String::from_utf8_lossy(k).into_owned(), String::from_utf8_lossy(v).into_owned()))
            .collect()
    }

    /// Case-sensitive header lookup on the decoded name.
    pub fn header(&self, name: &str) -> Option<String> {
        self.head.headers.iter()
            .rev()
            .find(|(k, _)| k.as_ref() == name.as_bytes())
            .map(|(_, v)| String::from_utf8_lossy(v).into_owned())
    }

    pub fn content_type(&self) -> Option<String> {
        self.header("content-type")
    }

    /// Parameters captured by the matched route pattern.
    pub fn path_params(&self) -> &HashMap<String, String> { &self.path_params }

    pub fn path_params_mut(&mut self) -> &mut HashMap<String, String> { &mut self.path_params }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.path_param("id")` on `/users/42` returns `Some("42")`.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    pub(crate) fn set_path_params(&mut self, params: HashMap<String, String>) {
        self.path_params = params;
    }

    /// The full request body. Drains the gateway stream on first use.
    pub async fn body(&self) -> Result<Bytes, Error> {
        self.body.lock().await.read().await
    }

    /// The body parsed as JSON.
    ///
    /// Fails with `400` if the content-type is not JSON or the body does not
    /// parse. The parsed value is cached.
    pub async fn json(&self) -> Result<Value, Error> {
        self.require_content_type(JSON)?;
        let mut state = self.body.lock().await;
        if let Some(value) = &state.json {
            return Ok(value.clone());
        }
        let raw = state.read().await?;
        let value: Value = serde_json::from_slice(&raw)
            .map_err(|e| HttpError::bad_request(format!("Invalid JSON: {e}")))?;
        state.json = Some(value.clone());
        Ok(value)
    }

    /// The JSON body deserialized into `T`.
    pub async fn json_as<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let value = self.json().await?;
        serde_json::from_value(value)
            .map_err(|e| HttpError::bad_request(format!("Invalid JSON: {e}")).into())
    }

    /// The body parsed as `application/x-www-form-urlencoded`. Cached.
    pub async fn form(&self) -> Result<QueryMap, Error> {
        self.require_content_type(FORM)?;
        let mut state = self.body.lock().await;
        if let Some(form) = &state.form {
            return Ok(form.clone());
        }
        let raw = state.read().await?;
        let form = parse_urlencoded(&raw);
        state.form = Some(form.clone());
        Ok(form)
    }

    fn require_content_type(&self, expected: &str) -> Result<(), HttpError> {
        let matches = self.content_type()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains(expected));
        if matches {
            Ok(())
        } else {
            Err(HttpError::bad_request(format!("Content-Type must be {expected}")))
        }
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.head.method)
            .field("path", &self.head.path)
            .field("path_params", &self.path_params)
            .finish_non_exhaustive()
    }
}

/// `+` is a space, escapes decode, blank values are dropped.
fn parse_urlencoded(input: &[u8]) -> QueryMap {
    let mut map = QueryMap::new();
    for (key, value) in url::form_urlencoded::parse(input) {
        if value.is_empty() {
            continue;
        }
        map.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    map
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::gateway::Chunk;
    use crate::handler::BoxFuture;

    fn request(content_type: &str, body: &'static str) -> Request {
        let scope = Scope::http("POST", "/test").with_header("content-type", content_type);
        Request::new(scope, VecDeque::from(vec![Chunk::last(body)]))
    }

    /// Counts how often the body stream is pulled.
    struct Counting {
        chunks: VecDeque<Chunk>,
        pulls: Arc<AtomicUsize>,
    }

    impl ChunkSource for Counting {
        fn receive(&mut self) -> BoxFuture<'_, Result<Chunk, Error>> {
            self.pulls.fetch_add(1, Ordering::SeqCst);
            let chunk = self.chunks.pop_front().unwrap_or_default();
            Box::pin(async move { Ok(chunk) })
        }
    }

    #[test]
    fn head_accessors() {
        let scope = Scope::http("GET", "/test")
            .with_query("name=John&age=25")
            .with_header("content-type", "application/json")
            .with_header("user-agent", "tests");
        let req = Request::new(scope, VecDeque::new());

        assert_eq!(req.method(), "GET");
        assert_eq!(req.path(), "/test");
        let query = req.query_params();
        assert_eq!(query["name"], vec!["John"]);
        assert_eq!(query["age"], vec!["25"]);
        let headers = req.headers();
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(headers["user-agent"], "tests");
        assert_eq!(req.content_type().as_deref(), Some("application/json"));
    }

    #[test]
    fn header_lookup_is_case_sensitive() {
        let req = Request::new(Scope::http("GET", "/").with_header("x-token", "a"), VecDeque::new());
        assert_eq!(req.header("x-token").as_deref(), Some("a"));
        assert_eq!(req.header("X-Token"), None);
    }

    #[test]
    fn repeated_query_keys_accumulate_and_blanks_drop() {
        let req = Request::new(Scope::http("GET", "/").with_query("tag=a&tag=b&empty=&q=x+y"), VecDeque::new());
        let query = req.query_params();
        assert_eq!(query["tag"], vec!["a", "b"]);
        assert_eq!(query["q"], vec!["x y"]);
        assert!(!query.contains_key("empty"));
    }

    #[tokio::test]
    async fn body_concatenates_chunks() {
        let chunks = VecDeque::from(vec![
            Chunk::part("Hello"),
            Chunk::part(", "),
            Chunk::part("World"),
            Chunk::last("!"),
        ]);
        let req = Request::new(Scope::http("POST", "/test"), chunks);
        assert_eq!(req.body().await.unwrap(), Bytes::from_static(b"Hello, World!"));
    }

    #[tokio::test]
    async fn body_is_drained_once() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let source = Counting {
            chunks: VecDeque::from(vec![Chunk::part("ab"), Chunk::last("c")]),
            pulls: Arc::clone(&pulls),
        };
        let req = Request::new(Scope::http("POST", "/"), source);
        let clone = req.clone();

        assert_eq!(clone.body().await.unwrap(), Bytes::from_static(b"abc"));
        assert_eq!(req.body().await.unwrap(), Bytes::from_static(b"abc"));
        assert_eq!(pulls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn json_parses_and_caches() {
        let req = request("application/json", r#"{"message":"Hello, World!"}"#);
        let expected = json!({"message": "Hello, World!"});

        assert_eq!(req.json().await.unwrap(), expected);
        assert_eq!(req.body.lock().await.json.as_ref(), Some(&expected));
        assert_eq!(req.json().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn json_content_type_check_ignores_case() {
        let req = request("Application/JSON; charset=utf-8", "[1,2]");
        assert_eq!(req.json().await.unwrap(), json!([1, 2]));
    }

    #[tokio::test]
    async fn invalid_json_is_bad_request() {
        let err = request("application/json", "invalid json").json().await.unwrap_err();
        let http = err.as_http().unwrap();
        assert_eq!(http.status(), 400);
        assert!(http.detail().starts_with("Invalid JSON"));
    }

    #[tokio::test]
    async fn json_requires_content_type() {
        let err = request("text/plain", "{}").json().await.unwrap_err();
        assert_eq!(err.as_http().unwrap().detail(), "Content-Type must be application/json");
    }

    #[tokio::test]
    async fn json_as_deserializes() {
        #[derive(serde::Deserialize)]
        struct Item { name: String }

        let item: Item = request("application/json", r#"{"name":"widget"}"#).json_as().await.unwrap();
        assert_eq!(item.name, "widget");
    }

    #[tokio::test]
    async fn form_decodes_values() {
        let req = request(FORM, "name=John+Doe&email=john%40example.com");
        let form = req.form().await.unwrap();
        assert_eq!(form["name"], vec!["John Doe"]);
        assert_eq!(form["email"], vec!["john@example.com"]);
        assert!(req.body.lock().await.form.is_some());
    }

    #[tokio::test]
    async fn form_requires_content_type() {
        let err = request("text/plain", "name=test").form().await.unwrap_err();
        assert_eq!(
            err.as_http().unwrap().detail(),
            "Content-Type must be application/x-www-form-urlencoded",
        );
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_every_time() {
        let req = Request::bounded(
            Scope::http("POST", "/"),
            VecDeque::from(vec![Chunk::part("hel"), Chunk::last("lo")]),
            Some(4),
        );
        for _ in 0..2 {
            let err = req.body().await.unwrap_err();
            let http = err.as_http().unwrap();
            assert_eq!(http.status(), 413);
            assert_eq!(http.detail(), "Request body exceeds 4 bytes");
        }
    }

    #[test]
    fn path_params_are_per_clone() {
        let mut req = Request::new(Scope::http("GET", "/users/123"), VecDeque::new());
        req.path_params_mut().insert("user_id".to_owned(), "123".to_owned());
        let other = Request::new(Scope::http("GET", "/"), VecDeque::new());

        assert_eq!(req.path_param("user_id"), Some("123"));
        assert_eq!(req.clone().path_param("user_id"), Some("123"));
        assert!(other.path_params().is_empty());
    }
}
