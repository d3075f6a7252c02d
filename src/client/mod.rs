//! Shared outbound HTTP client
//!
//! One `HttpClient` is created at process start and handed to every proxy
//! backend. It owns the connection pool, limits concurrent upstream requests
//! with a semaphore and retries idempotent requests on transient failures.

pub mod retry;

pub use retry::RetryManager;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{redirect, Client, Method};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::HttpClientConfig;
use crate::error::ClientError;
use crate::slice::SliceResponse;

/// Headers that describe a single connection and are never forwarded
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Request sent to an upstream server
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    /// HTTP method
    pub method: String,
    /// Absolute URL
    pub url: String,
    /// Request headers
    pub headers: Vec<(String, String)>,
    /// Basic credentials for the upstream
    pub basic_auth: Option<(String, String)>,
    /// Request body
    pub body: Bytes,
}

impl OutboundRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
            headers: Vec::new(),
            basic_auth: None,
            body: Bytes::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.basic_auth = Some((username.into(), password.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// GET and HEAD may be repeated without side effects
    pub fn is_idempotent(&self) -> bool {
        matches!(self.method.as_str(), "GET" | "HEAD")
    }
}

/// HTTP client shared by all proxy backends
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    semaphore: Arc<Semaphore>,
    retry: RetryManager,
}

impl HttpClient {
    /// Create the client
    pub fn start(config: &HttpClientConfig) -> Result<Self, ClientError> {
        let policy = if config.follow_redirects {
            redirect::Policy::limited(10)
        } else {
            redirect::Policy::none()
        };
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .redirect(policy)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        info!(
            max_concurrent = config.max_concurrent,
            max_retries = config.retry.max_retries,
            "HTTP client started"
        );

        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            retry: RetryManager::new(config.retry.clone()),
        })
    }

    /// Send a request and read the whole response
    ///
    /// HTTP error statuses are returned as responses; only transport
    /// failures are errors.
    pub async fn send(&self, request: &OutboundRequest) -> Result<SliceResponse, ClientError> {
        if request.is_idempotent() {
            self.retry.execute(|| self.send_once(request)).await
        } else {
            self.send_once(request).await
        }
    }

    async fn send_once(&self, request: &OutboundRequest) -> Result<SliceResponse, ClientError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ClientError::Closed)?;

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| ClientError::InvalidRequest(format!("method '{}'", request.method)))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            if !is_hop_by_hop(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if let Some((username, password)) = &request.basic_auth {
            builder = builder.basic_auth(username, Some(password));
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        debug!(method = %request.method, url = %request.url, "Sending upstream request");

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout
            } else if e.is_connect() {
                ClientError::Connect(e.to_string())
            } else if e.is_builder() {
                ClientError::InvalidRequest(e.to_string())
            } else {
                ClientError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let mut content_type = None;
        let mut headers = Vec::new();
        for (name, value) in response.headers() {
            let Ok(value) = value.to_str() else {
                continue;
            };
            if *name == reqwest::header::CONTENT_TYPE {
                content_type = Some(value.to_string());
            } else if !is_hop_by_hop(name.as_str()) && *name != reqwest::header::CONTENT_LENGTH {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout
            } else {
                ClientError::Network(e.to_string())
            }
        })?;

        if status >= 500 {
            warn!(url = %request.url, status, "Upstream server error");
        } else {
            debug!(
                url = %request.url,
                status,
                body_size = body.len(),
                "Received upstream response"
            );
        }

        let mut result = SliceResponse::new(status, body);
        result.headers = headers;
        if let Some(content_type) = content_type {
            result.content_type = content_type;
        }
        Ok(result)
    }

    /// Stop accepting requests; later sends fail with `ClientError::Closed`
    pub fn shutdown(&self) {
        if !self.semaphore.is_closed() {
            self.semaphore.close();
            info!("HTTP client stopped");
        }
    }

    /// Returns true until `shutdown` is called
    pub fn is_running(&self) -> bool {
        !self.semaphore.is_closed()
    }

    /// Get number of available permits (concurrent request slots)
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Guard that shuts the client down when dropped
    pub fn shutdown_guard(self: &Arc<Self>) -> ShutdownGuard {
        ShutdownGuard {
            client: Arc::clone(self),
        }
    }
}

/// Shuts the shared client down on every exit path of its owner
pub struct ShutdownGuard {
    client: Arc<HttpClient>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.client.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> HttpClientConfig {
        HttpClientConfig {
            max_concurrent: 2,
            connect_timeout_secs: 2,
            request_timeout_secs: 5,
            follow_redirects: true,
            retry: RetryConfig {
                max_retries: 1,
                initial_backoff_ms: 0,
                max_backoff_ms: 0,
                backoff_multiplier: 2.0,
                jitter: false,
            },
        }
    }

    #[tokio::test]
    async fn test_get_returns_status_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/com/acme/lib.jar"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"abc\"")
                    .set_body_raw("jar-bytes", "application/java-archive"),
            )
            .mount(&server)
            .await;
        let client = HttpClient::start(&config()).unwrap();

        let response = client
            .send(&OutboundRequest::get(format!("{}/com/acme/lib.jar", server.uri())))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, Bytes::from("jar-bytes"));
        assert_eq!(response.content_type, "application/java-archive");
        assert_eq!(response.header("etag"), Some("\"abc\""));
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let client = HttpClient::start(&config()).unwrap();

        let response = client
            .send(&OutboundRequest::get(format!("{}/missing", server.uri())))
            .await
            .unwrap();

        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_basic_auth_and_body_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/upload"))
            .and(header("Authorization", "Basic dXNlcjpwYXNz"))
            .and(body_string("payload"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        let client = HttpClient::start(&config()).unwrap();

        let request = OutboundRequest::new("put", format!("{}/upload", server.uri()))
            .with_basic_auth("user", "pass")
            .with_header("Connection", "close")
            .with_body("payload");
        let response = client.send(&request).await.unwrap();

        assert_eq!(response.status, 201);
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let client = HttpClient::start(&config()).unwrap();

        let err = client
            .send(&OutboundRequest::get("http://127.0.0.1:1/unreachable"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Connect(_)));
    }

    #[tokio::test]
    async fn test_invalid_method() {
        let client = HttpClient::start(&config()).unwrap();

        let err = client
            .send(&OutboundRequest::new("BAD METHOD", "http://localhost/"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_shutdown_closes_client() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let client = HttpClient::start(&config()).unwrap();
        assert!(client.is_running());
        assert_eq!(client.available_permits(), 2);

        client.shutdown();
        client.shutdown();

        assert!(!client.is_running());
        let err = client
            .send(&OutboundRequest::get(server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::Closed);
    }

    #[test]
    fn test_guard_shuts_down_on_early_return() {
        fn fail_after_start(client: &Arc<HttpClient>) -> Result<(), ClientError> {
            let _guard = client.shutdown_guard();
            Err(ClientError::Closed)
        }
        let client = Arc::new(HttpClient::start(&config()).unwrap());

        assert!(fail_after_start(&client).is_err());

        assert!(!client.is_running());
    }

    #[test]
    fn test_outbound_request_idempotency() {
        assert!(OutboundRequest::get("http://x/").is_idempotent());
        assert!(OutboundRequest::new("head", "http://x/").is_idempotent());
        assert!(!OutboundRequest::new("POST", "http://x/").is_idempotent());
    }
}
