//! Access log middleware
//!
//! Assigns the request id, stores a [`RequestContext`] in the request
//! extensions and writes one `hatch::access` entry per request.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request};
use axum::http::header::{HeaderValue, USER_AGENT};
use axum::middleware::Next;
use axum::response::Response;
use hatch_core::ACCESS_TARGET;
use tracing::Instrument;

use crate::services::RequestContext;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn access_log(mut req: Request, next: Next) -> Response {
    let start = Instant::now();

    let client_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let ctx = RequestContext::new(client_ip);
    req.extensions_mut().insert(ctx);

    let method = req.method().clone();
    let url = req.uri().to_string();
    let path = req.uri().path().to_owned();
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_owned();
    let client = client_ip.map_or_else(|| "unknown".to_owned(), |ip| ip.to_string());

    let span = tracing::info_span!("request", request_id = %ctx.request_id);
    let mut response = next.run(req).instrument(span).await;

    let duration_ms = (start.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;
    let status_code = response.status().as_u16();

    if response.status().is_server_error() {
        tracing::error!(
            target: ACCESS_TARGET,
            request_id = %ctx.request_id,
            client_ip = %client,
            method = %method,
            url = %url,
            path = %path,
            user_agent = %user_agent,
            status_code,
            duration_ms,
            "Request failed"
        );
    } else {
        tracing::info!(
            target: ACCESS_TARGET,
            request_id = %ctx.request_id,
            client_ip = %client,
            method = %method,
            url = %url,
            path = %path,
            user_agent = %user_agent,
            status_code,
            duration_ms,
            "Request completed"
        );
    }

    if let Ok(value) = HeaderValue::from_str(&ctx.request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;
    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn sets_request_id_header_and_logs_once() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .finish();
        let _default = tracing::subscriber::set_default(subscriber);

        let app = Router::new()
            .route("/ping", get(|ctx: RequestContext| async move { ctx.request_id.to_string() }))
            .layer(axum::middleware::from_fn(access_log));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ping?x=1")
                    .header(USER_AGENT, "probe/1.0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let header = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_owned();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        // The handler saw the same context the header reports
        assert_eq!(header, String::from_utf8(bytes.to_vec()).unwrap());

        let logged = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        let entries: Vec<&str> = logged.lines().filter(|l| l.contains(ACCESS_TARGET)).collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].contains("status_code=200"));
        assert!(entries[0].contains("user_agent=probe/1.0"));
        assert!(entries[0].contains(&header));
    }
}
