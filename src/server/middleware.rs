//! HTTP middleware
//!
//! Every request is logged once it completes, inside a span carrying the
//! method and URI so that events emitted by repositories are attributed to it.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::Instrument;

/// Logging middleware function
///
/// Logs method, path, status code and response time.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let span = tracing::info_span!(
        "http_request",
        http.method = %method,
        http.url = %uri,
        http.status_code = tracing::field::Empty,
    );

    async move {
        let response = next.run(request).await;
        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());

        tracing::info!(
            method = %method,
            path = %uri.path(),
            status = %status.as_u16(),
            duration_ms = %start.elapsed().as_millis(),
            "Request completed"
        );
        response
    }
    .instrument(span)
    .await
}
