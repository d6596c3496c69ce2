//! Integration tests for malformed and unroutable requests
//!
//! Uses raw sockets so requests a well-behaved client would never send can be
//! delivered byte for byte.

use std::time::Duration;

use loopcast_core::LoopcastConfig;
use loopcast_core::test_fixtures::patterned_bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::common::{
    header_of, raw_exchange, read_until_closed, serve_memory_file, serve_memory_file_with,
    split_response, status_of, url_path,
};

async fn status_for(port: u16, request: &str) -> (u16, String, Vec<u8>) {
    let response = raw_exchange(port, request.as_bytes()).await;
    let (head, body) = split_response(&response);
    (status_of(&head), head, body)
}

#[tokio::test]
async fn test_malformed_request_line() {
    let fixture = serve_memory_file("a.mkv", patterned_bytes(10)).await;
    let port = fixture.proxy.port().unwrap();

    let (status, head, body) = status_for(port, "GARBAGE\r\n\r\n").await;

    assert_eq!(status, 400);
    assert_eq!(header_of(&head, "connection"), Some("close"));
    assert_eq!(body, b"400 Bad Request");
}

#[tokio::test]
async fn test_unsupported_method() {
    let fixture = serve_memory_file("a.mkv", patterned_bytes(10)).await;
    let port = fixture.proxy.port().unwrap();
    let path = url_path(&fixture.url).to_string();

    for method in ["POST", "PUT", "DELETE", "OPTIONS"] {
        let (status, _, body) = status_for(port, &format!("{method} {path} HTTP/1.1\r\n\r\n")).await;
        assert_eq!(status, 405, "{method} should be rejected");
        assert_eq!(body, b"405 Method Not Allowed");
    }
}

#[tokio::test]
async fn test_path_outside_stream_prefix() {
    let fixture = serve_memory_file("a.mkv", patterned_bytes(10)).await;
    let port = fixture.proxy.port().unwrap();

    for path in ["/", "/favicon.ico", "/streams/abc", "/stream"] {
        let (status, _, _) = status_for(port, &format!("GET {path} HTTP/1.1\r\n\r\n")).await;
        assert_eq!(status, 404, "{path} should not resolve");
    }
}

#[tokio::test]
async fn test_unknown_token() {
    let fixture = serve_memory_file("a.mkv", patterned_bytes(10)).await;
    let port = fixture.proxy.port().unwrap();

    for method in ["GET", "HEAD"] {
        let request = format!("{method} /stream/not-a-real-token HTTP/1.1\r\n\r\n");
        let (status, _, body) = status_for(port, &request).await;
        assert_eq!(status, 404);
        if method == "GET" {
            assert_eq!(body, b"404 Not Found");
        }
    }

    let (status, _, _) = status_for(port, "GET /stream/ HTTP/1.1\r\n\r\n").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_header_names_are_case_insensitive() {
    let fixture = serve_memory_file("a.mkv", patterned_bytes(100)).await;
    let port = fixture.proxy.port().unwrap();
    let path = url_path(&fixture.url).to_string();

    let (status, head, body) =
        status_for(port, &format!("GET {path} HTTP/1.1\r\nrAnGe: bytes=10-19\r\n\r\n")).await;

    assert_eq!(status, 206);
    assert_eq!(header_of(&head, "content-range"), Some("bytes 10-19/100"));
    assert_eq!(body, &patterned_bytes(100)[10..20]);
}

#[tokio::test]
async fn test_oversized_request_head() {
    let mut config = LoopcastConfig::for_testing();
    config.proxy.max_header_bytes = 256;
    let fixture = serve_memory_file_with(config, "a.mkv", patterned_bytes(10)).await;
    let port = fixture.proxy.port().unwrap();
    let path = url_path(&fixture.url).to_string();

    let padding = "x".repeat(1024);
    let (status, _, _) =
        status_for(port, &format!("GET {path} HTTP/1.1\r\nX-Padding: {padding}\r\n\r\n")).await;

    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_silent_client_is_disconnected() {
    let mut config = LoopcastConfig::for_testing();
    config.proxy.request_timeout = Duration::from_millis(200);
    let fixture = serve_memory_file_with(config, "a.mkv", patterned_bytes(10)).await;
    let port = fixture.proxy.port().unwrap();

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    // Partial request line, never finished
    stream.write_all(b"GET /stream/").await.unwrap();

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(2), read_until_closed(&mut stream, &mut response))
        .await
        .expect("Stalled connection should be closed");
    assert!(response.is_empty());
}

#[tokio::test]
async fn test_client_closing_without_request() {
    let fixture = serve_memory_file("a.mkv", patterned_bytes(10)).await;
    let port = fixture.proxy.port().unwrap();

    drop(TcpStream::connect(("127.0.0.1", port)).await.unwrap());

    // The proxy keeps serving after the empty connection
    let response = reqwest::get(&fixture.url).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
}
