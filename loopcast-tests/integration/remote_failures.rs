//! Integration tests for remote adapter failures
//!
//! Failures before the response head is sent map to status codes; failures
//! after it can only cut the body short.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use loopcast_core::remote::FailurePoint;
use loopcast_core::test_fixtures::patterned_bytes;
use loopcast_core::{LoopcastConfig, RemoteAccess, RemoteError, RemoteReader, StreamProxy};
use reqwest::StatusCode;
use reqwest::header::RANGE;

use crate::common::{raw_exchange, serve_memory_file, split_response, status_of, url_path};

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let fixture = serve_memory_file("gone.mkv", patterned_bytes(100)).await;
    fixture.share.remove("gone.mkv");

    let response = reqwest::get(&fixture.url).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(fixture.proxy.stats().client_errors, 1);
}

#[tokio::test]
async fn test_pre_head_failures_are_server_errors() {
    for point in [FailurePoint::Exists, FailurePoint::Length, FailurePoint::Open] {
        let fixture = serve_memory_file("broken.mkv", patterned_bytes(100)).await;
        fixture.share.fail_on("broken.mkv", point);

        let response = reqwest::get(&fixture.url).await.unwrap();

        assert_eq!(
            response.status(),
            StatusCode::INTERNAL_SERVER_ERROR,
            "failure at {point:?}"
        );
        assert_eq!(
            response.text().await.unwrap(),
            "500 Internal Server Error"
        );
    }
}

#[tokio::test]
async fn test_unsatisfiable_range_checked_before_open() {
    let fixture = serve_memory_file("broken.mkv", patterned_bytes(100)).await;
    fixture.share.fail_on("broken.mkv", FailurePoint::Open);

    let response = reqwest::Client::new()
        .get(&fixture.url)
        .header(RANGE, "bytes=500-")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
}

#[tokio::test]
async fn test_read_failure_truncates_body() {
    let data = patterned_bytes(20_000);
    let fixture = serve_memory_file("flaky.mkv", data.clone()).await;
    fixture.share.fail_on("flaky.mkv", FailurePoint::ReadAfter(8192));
    let port = fixture.proxy.port().unwrap();
    let path = url_path(&fixture.url).to_string();

    let response = raw_exchange(port, format!("GET {path} HTTP/1.1\r\n\r\n").as_bytes()).await;
    let (head, body) = split_response(&response);

    // Status and length were committed before the failure
    assert_eq!(status_of(&head), 200);
    assert!(head.contains("Content-Length: 20000"));
    assert_eq!(body.len(), 8192);
    assert_eq!(body, &data[..8192]);

    // The failed stream does not take the listener down
    assert!(fixture.proxy.is_serving());
    fixture.share.insert("other.mkv", patterned_bytes(10));
    let remote: Arc<dyn RemoteAccess> = Arc::new(fixture.share.clone());
    let url = fixture.proxy.register(remote, "other.mkv", None).await.unwrap();
    assert_eq!(reqwest::get(&url).await.unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn test_source_ending_early_closes_cleanly() {
    let data = patterned_bytes(1000);
    let fixture = serve_memory_file("shrunk.mkv", data.clone()).await;
    fixture.share.fail_on("shrunk.mkv", FailurePoint::EofAfter(300));
    let port = fixture.proxy.port().unwrap();
    let path = url_path(&fixture.url).to_string();

    let response = raw_exchange(port, format!("GET {path} HTTP/1.1\r\n\r\n").as_bytes()).await;
    let (head, body) = split_response(&response);

    // The head advertises the length reported before streaming began
    assert_eq!(status_of(&head), 200);
    assert!(head.contains("Content-Length: 1000"));
    assert_eq!(body, &data[..300]);

    let stats = fixture.proxy.stats();
    assert_eq!(stats.aborted_streams, 0);
    assert_eq!(stats.bytes_streamed, 300);
    assert_eq!(stats.success_responses, 1);
}

/// Adapter whose existence check never answers in time.
struct StalledShare {
    delay: Duration,
}

#[async_trait]
impl RemoteAccess for StalledShare {
    async fn exists(&self, _path: &str) -> Result<bool, RemoteError> {
        tokio::time::sleep(self.delay).await;
        Ok(true)
    }

    async fn length(&self, _path: &str) -> Result<u64, RemoteError> {
        Ok(0)
    }

    async fn open(&self, path: &str) -> Result<Box<dyn RemoteReader>, RemoteError> {
        Err(RemoteError::NotFound {
            path: path.to_string(),
        })
    }
}

#[tokio::test]
async fn test_stalled_adapter_times_out() {
    let mut config = LoopcastConfig::for_testing();
    config.proxy.io_timeout = Duration::from_millis(200);
    let proxy = StreamProxy::new(config);
    let remote: Arc<dyn RemoteAccess> = Arc::new(StalledShare {
        delay: Duration::from_secs(10),
    });
    let url = proxy.register(remote, "slow.mkv", None).await.unwrap();

    let started = std::time::Instant::now();
    let response = reqwest::get(&url).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(started.elapsed() < Duration::from_secs(5));
}
