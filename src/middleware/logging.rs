//! Request/response logging through `tracing`.

use std::time::Instant;

use tracing::info;

use super::{Middleware, Next};
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Logs each request on the way in and its status and latency on the way
/// out. Failures are not logged here; they surface at the app boundary.
#[derive(Clone, Copy, Debug, Default)]
pub struct Logging;

impl Middleware for Logging {
    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin(log_exchange(req, next))
    }
}

async fn log_exchange(req: Request, next: Next) -> Result<Response, Error> {
    let start = Instant::now();
    let method = req.method().to_owned();
    let path = req.path().to_owned();
    let user_agent = req.header("user-agent").unwrap_or_else(|| "Unknown".to_owned());
    info!(%method, %path, %user_agent, "request received");

    let res = next.run(req).await?;

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    info!(%method, %path, status = res.status(), elapsed_ms, "response sent");
    Ok(res)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;
    use crate::middleware::test_support::{request, run};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> { Ok(()) }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer { self.clone() }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn logs_request_and_response() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let res = run(Logging, request("GET", &[("user-agent", "tests")])).await.unwrap();
        assert_eq!(res.status(), 200);

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("request received"));
        assert!(output.contains("user_agent=tests"));
        assert!(output.contains("response sent"));
        assert!(output.contains("status=200"));
        assert!(output.contains("path=/test"));
    }
}
