//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;

use registry_composer::client::HttpClient;
use registry_composer::compose::Composer;
use registry_composer::config::{HttpClientConfig, Layout, MetaConfig, ServerConfig};
use registry_composer::registry::ProtocolRegistry;
use registry_composer::server::{AppState, RepositorySlices};
use registry_composer::settings::YamlSettings;
use registry_composer::storage::{InMemoryStorage, Key, Storage, StorageConfig};

/// Settings over an in-memory settings storage holding `files`
///
/// Aliases `default`, `a`, `b` and `c` name separate in-memory storages.
pub async fn create_test_settings(
    layout: Layout,
    files: &[(&str, &str)],
) -> (Arc<YamlSettings>, Arc<InMemoryStorage>) {
    let storage = Arc::new(InMemoryStorage::new());
    for (name, content) in files {
        storage
            .save(&Key::new(name).unwrap(), Bytes::from(content.to_string()))
            .await
            .unwrap();
    }
    let mut meta = MetaConfig {
        layout,
        ..MetaConfig::default()
    };
    for alias in ["default", "a", "b", "c"] {
        meta.storages.insert(alias.to_string(), StorageConfig::Memory);
    }
    let settings = Arc::new(YamlSettings::with_storage(meta, storage.clone()));
    (settings, storage)
}

/// Composer with the default protocol registry and a fast-failing client
pub fn create_test_composer(settings: Arc<YamlSettings>) -> Composer {
    let client_config = HttpClientConfig {
        connect_timeout_secs: 2,
        request_timeout_secs: 5,
        ..HttpClientConfig::default()
    };
    Composer::new(
        settings,
        Arc::new(ProtocolRegistry::with_defaults()),
        Arc::new(HttpClient::start(&client_config).expect("Failed to start HTTP client")),
    )
}

/// Repository file for a hosted type on the `default` alias
pub fn hosted_repo(kind: &str) -> String {
    format!("repo:\n  type: {}\n  storage: default\n", kind)
}

/// Repository file for a group
pub fn group_repo(members: &[&str]) -> String {
    format!(
        "repo:\n  type: maven-group\n  settings:\n    repositories: [{}]\n",
        members.join(", ")
    )
}

/// Create a test server configuration with a random port
pub fn create_test_server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..ServerConfig::default()
    }
}

/// Run a test server in the background and return the address
/// The server will be shut down when the returned shutdown sender is dropped or sent
pub async fn run_test_server(
    slices: RepositorySlices,
) -> (std::net::SocketAddr, tokio::sync::oneshot::Sender<()>) {
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let app = registry_composer::server::build_router(AppState::new(slices))
        .layer(tower_http::trace::TraceLayer::new_for_http());

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server error");
    });

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    (addr, shutdown_tx)
}
