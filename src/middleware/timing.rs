//! `X-Process-Time` header.

use std::time::Instant;

use super::{Middleware, Next};
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Stamps the wall-clock time spent in the rest of the chain, in seconds
/// with millisecond precision.
#[derive(Clone, Copy, Debug, Default)]
pub struct Timing;

impl Middleware for Timing {
    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin(stamp(req, next))
    }
}

async fn stamp(req: Request, next: Next) -> Result<Response, Error> {
    let start = Instant::now();
    let mut res = next.run(req).await?;
    let elapsed = start.elapsed().as_secs_f64();
    res.headers_mut().insert("X-Process-Time", format!("{elapsed:.3}"));
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::test_support::{request, run};

    #[tokio::test]
    async fn sets_process_time() {
        let res = run(Timing, request("GET", &[])).await.unwrap();
        let value = res.headers().get("X-Process-Time").unwrap();
        let seconds: f64 = value.parse().unwrap();
        assert!(seconds >= 0.0);
        assert_eq!(value.split_once('.').map(|(_, frac)| frac.len()), Some(3));
    }
}
