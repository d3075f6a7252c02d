//! HTTP front end integration tests
//!
//! Runs the router over real sockets with composed repositories:
//! - Health endpoint
//! - Upload and download through the shared namespace
//! - Docker API paths
//! - Standalone serving

mod common;

use common::*;
use registry_composer::config::Layout;
use registry_composer::server::{HealthResponse, RepositorySlices};
use registry_composer::settings::Settings;
use reqwest::StatusCode;

async fn shared_server(files: &[(&str, &str)]) -> (String, tokio::sync::oneshot::Sender<()>) {
    let (settings, _) = create_test_settings(Layout::Flat, files).await;
    let aliases = settings.storage_aliases().await.unwrap();
    let composer = create_test_composer(settings);
    let repos = composer.build_all(&aliases).await.unwrap();
    let (addr, shutdown) = run_test_server(RepositorySlices::shared(Layout::Flat, repos)).await;
    (format!("http://{}", addr), shutdown)
}

/// Test 1: Health endpoint reports the served repositories
#[tokio::test]
async fn test_health() {
    let maven = hosted_repo("maven");
    let npm = "repo:\n  type: npm\n  storage: b\n  url: http://localhost/npm\n";
    let (base, _shutdown) =
        shared_server(&[("maven.yaml", maven.as_str()), ("npm.yaml", npm)]).await;

    let response = reqwest::get(format!("{}/health", base)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: HealthResponse = serde_json::from_str(&response.text().await.unwrap()).unwrap();
    assert_eq!(body.status, "healthy");
    assert_eq!(body.repositories, 2);
}

/// Test 2: Upload then download through the shared namespace
#[tokio::test]
async fn test_upload_and_download() {
    let files = hosted_repo("file");
    let (base, _shutdown) = shared_server(&[("files.yaml", files.as_str())]).await;
    let client = reqwest::Client::new();

    let response = client
        .put(format!("{}/files/docs/readme.txt", base))
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client
        .get(format!("{}/files/docs/readme.txt", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "hello");

    let response = client
        .get(format!("{}/files/docs/other.txt", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .get(format!("{}/unknown/docs/readme.txt", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Test 3: Broken repositories are left out of the namespace
#[tokio::test]
async fn test_broken_repository_is_skipped() {
    let files = hosted_repo("file");
    let (base, _shutdown) = shared_server(&[
        ("files.yaml", files.as_str()),
        ("broken.yaml", "repo:\n  type: cargo\n"),
    ])
    .await;

    let text = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let body: HealthResponse = serde_json::from_str(&text).unwrap();

    assert_eq!(body.repositories, 1);
}

/// Test 4: Docker API paths reach the named registry
#[tokio::test]
async fn test_docker_api_paths() {
    let registry = hosted_repo("docker");
    let (base, _shutdown) = shared_server(&[("registry.yaml", registry.as_str())]).await;
    let client = reqwest::Client::new();

    let response = client
        .put(format!("{}/v2/registry/alpine/manifests/latest", base))
        .body("manifest")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client
        .get(format!("{}/v2/registry/alpine/manifests/latest", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "manifest");

    let response = client
        .get(format!("{}/v2/other/alpine/manifests/latest", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Test 5: A standalone repository is served at the root
#[tokio::test]
async fn test_standalone_server() {
    let files = hosted_repo("file");
    let (settings, _) =
        create_test_settings(Layout::Flat, &[("files.yaml", files.as_str())]).await;
    let aliases = settings.storage_aliases().await.unwrap();
    let slice = create_test_composer(settings)
        .build_named("files", &aliases, true)
        .await
        .unwrap();
    let (addr, _shutdown) = run_test_server(RepositorySlices::standalone("files", slice)).await;
    let client = reqwest::Client::new();

    let response = client
        .put(format!("http://{}/a.txt", addr))
        .body("root")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client
        .get(format!("http://{}/a.txt", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "root");
}

/// Test 6: Oversized uploads are refused over HTTP
#[tokio::test]
async fn test_upload_limit_over_http() {
    let repo = "repo:\n  type: file\n  storage: default\n  content-length-max: 4\n";
    let (base, _shutdown) = shared_server(&[("files.yaml", repo)]).await;

    let response = reqwest::Client::new()
        .put(format!("{}/files/big.bin", base))
        .body("too large")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
