//! Integration tests for connection admission limits

use std::time::Duration;

use futures::future::join_all;
use loopcast_core::LoopcastConfig;
use loopcast_core::test_fixtures::patterned_bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::common::{
    read_until_closed, serve_memory_file, serve_memory_file_with, split_response, status_of,
    url_path,
};

#[tokio::test]
async fn test_connection_waits_for_free_slot() {
    let mut config = LoopcastConfig::for_testing();
    config.proxy.max_connections = 1;
    let fixture = serve_memory_file_with(config, "a.mkv", patterned_bytes(100)).await;
    let port = fixture.proxy.port().unwrap();
    let path = url_path(&fixture.url).to_string();

    // Holds the only slot without sending a request
    let idle = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut waiting = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    waiting
        .write_all(format!("GET {path} HTTP/1.1\r\n\r\n").as_bytes())
        .await
        .unwrap();

    let mut response = Vec::new();
    let blocked = tokio::time::timeout(
        Duration::from_millis(300),
        read_until_closed(&mut waiting, &mut response),
    )
    .await;
    assert!(blocked.is_err(), "Second connection served while slot was taken");
    assert!(response.is_empty());

    drop(idle);

    tokio::time::timeout(
        Duration::from_secs(2),
        read_until_closed(&mut waiting, &mut response),
    )
    .await
    .expect("Second connection should be served once the slot frees");
    let (head, body) = split_response(&response);
    assert_eq!(status_of(&head), 200);
    assert_eq!(body, patterned_bytes(100));
}

#[tokio::test]
async fn test_many_concurrent_streams() {
    let data = patterned_bytes(50_000);
    let fixture = serve_memory_file("shared.mkv", data.clone()).await;
    let client = reqwest::Client::new();

    let requests = (0..20).map(|_| {
        let client = client.clone();
        let url = fixture.url.clone();
        async move { client.get(&url).send().await?.bytes().await }
    });

    for body in join_all(requests).await {
        assert_eq!(body.unwrap().as_ref(), data.as_slice());
    }
    assert_eq!(fixture.proxy.stats().success_responses, 20);
}
