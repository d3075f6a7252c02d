//! HTTP router
//!
//! `/health` reports liveness; every other request is converted to a
//! `SliceRequest` and handed to the composed repositories.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, FromRequest, Request, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use crate::slice::{SliceRequest, SliceResponse};

use super::dispatch::RepositorySlices;
use super::middleware::logging_middleware;

/// Largest request body accepted when none is configured
pub const DEFAULT_BODY_LIMIT: usize = 1 << 30;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Composed repositories
    pub slices: Arc<RepositorySlices>,

    /// Largest request body buffered for a repository, in bytes
    pub body_limit: usize,
}

impl AppState {
    pub fn new(slices: RepositorySlices) -> Self {
        Self {
            slices: Arc::new(slices),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Override the request body limit
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub repositories: usize,
}

/// Build the application router
///
/// Bodies above the state's limit are answered with `413`: a declared
/// `Content-Length` before anything is read, a streamed body once it crosses
/// the limit.
pub fn build_router(state: AppState) -> Router {
    let limit = state.body_limit;
    Router::new()
        .route("/health", get(health_handler))
        .fallback(repository_handler)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(limit))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        repositories: state.slices.names().len(),
    })
}

async fn repository_handler(State(state): State<AppState>, request: Request) -> Response {
    let request = match slice_request(request).await {
        Ok(request) => request,
        Err(response) => return response,
    };
    state.slices.serve(&request).await.into_response()
}

/// Convert an inbound HTTP request, buffering its body
///
/// The body is bounded by the router's limit layer.
async fn slice_request(request: Request) -> Result<SliceRequest, Response> {
    let mut converted = SliceRequest::new(request.method().as_str(), request.uri().path());
    if let Some(query) = request.uri().query() {
        converted = converted.with_query(query);
    }
    for (name, value) in request.headers().iter() {
        if let Ok(value) = value.to_str() {
            converted = converted.with_header(name.as_str(), value);
        }
    }

    let body = Bytes::from_request(request, &())
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(converted.with_body(body))
}

impl IntoResponse for SliceResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, self.content_type.as_str());
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.body(Body::from(self.body)).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Invalid repository response");
            (StatusCode::INTERNAL_SERVER_ERROR, "invalid response").into_response()
        })
    }
}
