//! Integration tests for byte-range streaming over HTTP
//!
//! Requests go through reqwest against a live proxy and compare the served
//! bytes with the registered content.

use loopcast_core::test_fixtures::patterned_bytes;
use proptest::prelude::*;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, RANGE};

use crate::common::{raw_exchange, serve_memory_file, split_response, url_path};

fn header(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[tokio::test]
async fn test_full_request_returns_whole_file() {
    let data = patterned_bytes(1000);
    let fixture = serve_memory_file("movie.mkv", data.clone()).await;

    let response = reqwest::get(&fixture.url).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, ACCEPT_RANGES).as_deref(), Some("bytes"));
    assert_eq!(header(&response, CONTENT_LENGTH).as_deref(), Some("1000"));
    assert_eq!(header(&response, CONTENT_RANGE), None);
    assert_eq!(response.bytes().await.unwrap().as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_explicit_range_returns_partial_content() {
    let data = patterned_bytes(1000);
    let fixture = serve_memory_file("movie.mkv", data.clone()).await;

    let response = reqwest::Client::new()
        .get(&fixture.url)
        .header(RANGE, "bytes=500-599")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header(&response, CONTENT_RANGE).as_deref(),
        Some("bytes 500-599/1000")
    );
    assert_eq!(header(&response, CONTENT_LENGTH).as_deref(), Some("100"));
    assert_eq!(response.bytes().await.unwrap().as_ref(), &data[500..600]);
}

#[tokio::test]
async fn test_suffix_range_returns_tail() {
    let data = patterned_bytes(1000);
    let fixture = serve_memory_file("movie.mkv", data.clone()).await;

    let response = reqwest::Client::new()
        .get(&fixture.url)
        .header(RANGE, "bytes=-100")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header(&response, CONTENT_RANGE).as_deref(),
        Some("bytes 900-999/1000")
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), &data[900..]);
}

#[tokio::test]
async fn test_range_end_past_file_is_clamped() {
    let data = patterned_bytes(1000);
    let fixture = serve_memory_file("movie.mkv", data.clone()).await;

    let response = reqwest::Client::new()
        .get(&fixture.url)
        .header(RANGE, "bytes=950-5000")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header(&response, CONTENT_RANGE).as_deref(),
        Some("bytes 950-999/1000")
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), &data[950..]);
}

#[tokio::test]
async fn test_range_beyond_file_is_not_satisfiable() {
    let fixture = serve_memory_file("movie.mkv", patterned_bytes(1000)).await;

    let response = reqwest::Client::new()
        .get(&fixture.url)
        .header(RANGE, "bytes=2000-")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(header(&response, CONTENT_RANGE).as_deref(), Some("bytes */1000"));
    assert!(response.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_multi_range_is_not_satisfiable() {
    let fixture = serve_memory_file("movie.mkv", patterned_bytes(1000)).await;

    let response = reqwest::Client::new()
        .get(&fixture.url)
        .header(RANGE, "bytes=0-10,20-30")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
}

#[tokio::test]
async fn test_head_matches_get_without_body() {
    let fixture = serve_memory_file("movie.mkv", patterned_bytes(1000)).await;
    let port = fixture.proxy.port().unwrap();
    let path = url_path(&fixture.url);

    for range in ["", "Range: bytes=100-199\r\n"] {
        let get = raw_exchange(
            port,
            format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n{range}\r\n").as_bytes(),
        )
        .await;
        let head = raw_exchange(
            port,
            format!("HEAD {path} HTTP/1.1\r\nHost: localhost\r\n{range}\r\n").as_bytes(),
        )
        .await;

        let (get_head, get_body) = split_response(&get);
        let (head_head, head_body) = split_response(&head);

        assert_eq!(get_head, head_head);
        assert!(!get_body.is_empty());
        assert!(head_body.is_empty());
    }
}

#[tokio::test]
async fn test_large_file_spans_many_chunks() {
    // Several times the 4 KiB testing chunk size, not a multiple of it
    let data = patterned_bytes(100_003);
    let fixture = serve_memory_file("large.mkv", data.clone()).await;

    let body = reqwest::get(&fixture.url).await.unwrap().bytes().await.unwrap();
    assert_eq!(body.as_ref(), data.as_slice());

    let response = reqwest::Client::new()
        .get(&fixture.url)
        .header(RANGE, "bytes=4095-12289")
        .send()
        .await
        .unwrap();
    assert_eq!(response.bytes().await.unwrap().as_ref(), &data[4095..12290]);
}

#[tokio::test]
async fn test_empty_file() {
    let fixture = serve_memory_file("empty.mkv", Vec::new()).await;

    let response = reqwest::get(&fixture.url).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, CONTENT_LENGTH).as_deref(), Some("0"));
    assert!(response.bytes().await.unwrap().is_empty());

    let response = reqwest::Client::new()
        .get(&fixture.url)
        .header(RANGE, "bytes=0-")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(header(&response, CONTENT_RANGE).as_deref(), Some("bytes */0"));
}

#[tokio::test]
async fn test_length_is_read_per_request() {
    let fixture = serve_memory_file("growing.mkv", patterned_bytes(100)).await;

    let first = reqwest::get(&fixture.url).await.unwrap();
    assert_eq!(header(&first, CONTENT_LENGTH).as_deref(), Some("100"));

    fixture.share.insert("growing.mkv", patterned_bytes(300));

    let second = reqwest::get(&fixture.url).await.unwrap();
    assert_eq!(header(&second, CONTENT_LENGTH).as_deref(), Some("300"));
    assert_eq!(second.bytes().await.unwrap().len(), 300);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_served_range_matches_content(start in 0u64..5000, span in 1u64..3000) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let data = patterned_bytes(5000);

        let (status, body) = runtime.block_on(async {
            let fixture = serve_memory_file("prop.mkv", data.clone()).await;
            let end = start + span - 1;
            let response = reqwest::Client::new()
                .get(&fixture.url)
                .header(RANGE, format!("bytes={start}-{end}"))
                .send()
                .await
                .unwrap();
            (response.status(), response.bytes().await.unwrap())
        });

        let end = (start + span - 1).min(4999) as usize;
        prop_assert_eq!(status, StatusCode::PARTIAL_CONTENT);
        prop_assert_eq!(body.as_ref(), &data[start as usize..=end]);
    }
}
