//! Shared helpers for the integration tests

use std::sync::Arc;
use std::time::Duration;

use loopcast_core::{LoopcastConfig, MemoryShare, RemoteAccess, StreamProxy};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Proxy with one registered in-memory file.
pub struct Fixture {
    pub proxy: StreamProxy,
    pub share: MemoryShare,
    pub url: String,
}

pub async fn serve_memory_file(path: &str, data: Vec<u8>) -> Fixture {
    serve_memory_file_with(LoopcastConfig::for_testing(), path, data).await
}

pub async fn serve_memory_file_with(config: LoopcastConfig, path: &str, data: Vec<u8>) -> Fixture {
    let share = loopcast_core::test_fixtures::memory_share(&[(path, data)]);
    let proxy = StreamProxy::new(config);
    let remote: Arc<dyn RemoteAccess> = Arc::new(share.clone());
    let url = proxy.register(remote, path, None).await.unwrap();
    Fixture { proxy, share, url }
}

/// Path component of a stream URL, e.g. `/stream/<token>`.
pub fn url_path(url: &str) -> &str {
    let after_scheme = url.strip_prefix("http://").unwrap();
    let slash = after_scheme.find('/').unwrap();
    &after_scheme[slash..]
}

/// Sends `request` verbatim and collects everything the proxy writes back
/// until it closes the connection.
pub async fn raw_exchange(port: u16, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream.write_all(request).await.unwrap();

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), read_until_closed(&mut stream, &mut response))
        .await
        .expect("Proxy did not close the connection");
    response
}

/// Reads until EOF; a reset after the response counts as the end.
pub async fn read_until_closed(stream: &mut TcpStream, response: &mut Vec<u8>) {
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => response.extend_from_slice(&buf[..n]),
        }
    }
}

/// Splits a raw response into its head text and body bytes.
pub fn split_response(response: &[u8]) -> (String, Vec<u8>) {
    let boundary = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("Response has no header terminator");
    let head = String::from_utf8_lossy(&response[..boundary]).into_owned();
    (head, response[boundary + 4..].to_vec())
}

pub fn status_of(head: &str) -> u16 {
    head.split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .expect("Response has no status code")
}

/// Case-insensitive header lookup on a raw response head.
pub fn header_of<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
    })
}
