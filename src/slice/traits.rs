//! Slice trait definition
//!
//! A slice is the unit every repository is served by: it receives one inbound
//! request and either answers it or declines so that a fallback can try.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use std::sync::Arc;

/// Header carrying the request path as it was before any trimming
pub const FULL_PATH_HEADER: &str = "X-FullPath";

/// Inbound request as seen by a slice
#[derive(Debug, Clone, PartialEq)]
pub struct SliceRequest {
    /// HTTP method in upper case
    pub method: String,

    /// Request path, always starting with `/`
    pub path: String,

    /// Raw query string without the leading `?`
    pub query: Option<String>,

    /// Request headers in arrival order
    pub headers: Vec<(String, String)>,

    /// Request body
    pub body: Bytes,
}

impl SliceRequest {
    /// Create a new request without headers or body
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            path: path.into(),
            query: None,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Shorthand for a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the query string
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Copy of this request addressed to another path
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..self.clone()
        }
    }

    /// First value of a header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Declared body size from the `Content-Length` header
    ///
    /// Returns `None` when the header is absent and `Some(Err(_))` when it is
    /// not a valid unsigned integer.
    pub fn content_length(&self) -> Option<Result<u64, std::num::ParseIntError>> {
        self.header("content-length")
            .map(|value| value.trim().parse::<u64>())
    }

    /// Credentials of an HTTP Basic `Authorization` header
    pub fn basic_credentials(&self) -> Option<(String, String)> {
        let header = self.header("authorization")?;
        let encoded = header.strip_prefix("Basic ")?;
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (name, password) = decoded.split_once(':')?;
        Some((name.to_string(), password.to_string()))
    }
}

/// Response produced by a slice
#[derive(Debug, Clone, PartialEq)]
pub struct SliceResponse {
    /// HTTP status code
    pub status: u16,

    /// Response headers
    pub headers: Vec<(String, String)>,

    /// Response body
    pub body: Bytes,

    /// Content type
    pub content_type: String,
}

impl SliceResponse {
    /// Create a new response
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            content_type: "application/octet-stream".to_string(),
        }
    }

    /// Create a successful response
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(200, body)
    }

    /// 201 Created with an empty body
    pub fn created() -> Self {
        Self::new(201, Bytes::new())
    }

    /// Create a not found response
    pub fn not_found() -> Self {
        Self::text(404, "Not Found")
    }

    /// 400 Bad Request with a reason
    pub fn bad_request(reason: &str) -> Self {
        Self::text(400, format!("Bad Request: {}", reason))
    }

    /// 401 Unauthorized with a Basic challenge
    pub fn unauthorized() -> Self {
        Self::text(401, "Unauthorized").with_header("WWW-Authenticate", "Basic realm=\"artifacts\"")
    }

    /// 403 Forbidden
    pub fn forbidden() -> Self {
        Self::text(403, "Forbidden")
    }

    /// 405 Method Not Allowed
    pub fn method_not_allowed() -> Self {
        Self::text(405, "Method Not Allowed")
    }

    /// 413 Payload Too Large
    pub fn payload_too_large(limit: u64) -> Self {
        Self::text(413, format!("Payload Too Large: limit is {} bytes", limit))
    }

    /// 500 Internal Server Error
    pub fn internal_error(reason: &str) -> Self {
        Self::text(500, format!("Internal Server Error: {}", reason))
    }

    /// 502 Bad Gateway
    pub fn bad_gateway(reason: &str) -> Self {
        Self::text(502, format!("Bad Gateway: {}", reason))
    }

    /// 503 Service Unavailable
    pub fn unavailable(reason: &str) -> Self {
        Self::text(503, format!("Service Unavailable: {}", reason))
    }

    fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, body.into()).with_content_type("text/plain")
    }

    /// Set the content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First value of a header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Rewrite every value of the given header
    pub fn map_header(mut self, name: &str, f: impl Fn(&str) -> Option<String>) -> Self {
        for (key, value) in self.headers.iter_mut() {
            if key.eq_ignore_ascii_case(name) {
                if let Some(mapped) = f(value) {
                    *value = mapped;
                }
            }
        }
        self
    }
}

/// Result of offering a request to a slice
#[derive(Debug, Clone, PartialEq)]
pub enum SliceOutcome {
    /// The slice claimed the request
    Handled(SliceResponse),

    /// The slice declined; a fallback may try
    NotHandled,
}

impl SliceOutcome {
    /// Returns true if the request was claimed
    pub fn is_handled(&self) -> bool {
        matches!(self, SliceOutcome::Handled(_))
    }

    /// The response, if the request was claimed
    pub fn response(&self) -> Option<&SliceResponse> {
        match self {
            SliceOutcome::Handled(response) => Some(response),
            SliceOutcome::NotHandled => None,
        }
    }

    /// Map the response of a claimed request
    pub fn map(self, f: impl FnOnce(SliceResponse) -> SliceResponse) -> Self {
        match self {
            SliceOutcome::Handled(response) => SliceOutcome::Handled(f(response)),
            SliceOutcome::NotHandled => SliceOutcome::NotHandled,
        }
    }

    /// The response, or 404 when nothing claimed the request
    pub fn into_response(self) -> SliceResponse {
        match self {
            SliceOutcome::Handled(response) => response,
            SliceOutcome::NotHandled => SliceResponse::not_found(),
        }
    }
}

impl From<SliceResponse> for SliceOutcome {
    fn from(response: SliceResponse) -> Self {
        SliceOutcome::Handled(response)
    }
}

/// Request handler for a repository
///
/// Implementations are protocol backends as well as the decorators the
/// composition engine wraps around them.
#[async_trait]
pub trait Slice: Send + Sync {
    /// Process a request
    async fn response(&self, request: &SliceRequest) -> SliceOutcome;
}

/// Slice shared between decorators, groups and the HTTP front end
pub type SharedSlice = Arc<dyn Slice>;
