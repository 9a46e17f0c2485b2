//! Cross-origin resource sharing.

use serde::Deserialize;
use serde_json::json;

use super::{Middleware, Next};
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// CORS policy. Defaults allow every origin and header.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: vec!["*".to_owned()],
            allow_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"].map(String::from).to_vec(),
            allow_headers: vec!["*".to_owned()],
            max_age: 86_400,
        }
    }
}

/// Answers `OPTIONS` preflights directly and stamps the CORS headers on
/// every response.
pub struct Cors {
    config: CorsConfig,
    methods: String,
    headers: String,
}

impl Cors {
    pub fn new(config: CorsConfig) -> Self {
        let methods = config.allow_methods.join(", ");
        let headers = config.allow_headers.join(", ");
        Self { config, methods, headers }
    }

    fn wildcard(&self) -> bool {
        self.config.allow_origins.iter().any(|o| o == "*")
    }

    fn allow_origin(&self, origin: Option<&str>) -> Option<String> {
        match origin {
            Some(origin) if self.wildcard() || self.config.allow_origins.iter().any(|o| o == origin) => {
                Some(origin.to_owned())
            }
            _ if self.wildcard() => Some("*".to_owned()),
            _ => None,
        }
    }
}

impl Default for Cors {
    fn default() -> Self { Self::new(CorsConfig::default()) }
}

impl Middleware for Cors {
    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin(self.respond(req, next))
    }
}

impl Cors {
    async fn respond(&self, req: Request, next: Next) -> Result<Response, Error> {
        let origin = req.header("origin");
        let mut res = if req.method() == "OPTIONS" {
            Response::json(json!({}))
        } else {
            next.run(req).await?
        };

        let headers = res.headers_mut();
        if let Some(allowed) = self.allow_origin(origin.as_deref()) {
            headers.insert("Access-Control-Allow-Origin", allowed);
        }
        headers.insert("Access-Control-Allow-Methods", self.methods.as_str());
        headers.insert("Access-Control-Allow-Headers", self.headers.as_str());
        headers.insert("Access-Control-Max-Age", self.config.max_age.to_string());
        Ok(res)
    }
}
