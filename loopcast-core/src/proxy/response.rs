//! Response head formatting
//!
//! Every response closes the connection. Error responses share one minimal
//! plain-text shape; streaming responses advertise byte-range support.

use std::fmt::Write as _;

use http::StatusCode;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::range::ByteRange;

fn status_line(status: StatusCode) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    )
}

/// Plain-text error response with a `"<code> <reason>"` body.
pub fn error_response(status: StatusCode) -> String {
    let body = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    );
    let mut response = status_line(status);
    let _ = write!(
        response,
        "Content-Length: {}\r\nConnection: close\r\nContent-Type: text/plain\r\n\r\n{}",
        body.len(),
        body
    );
    response
}

/// `416` response carrying the resource length and an empty body.
pub fn range_not_satisfiable(length: u64) -> String {
    let mut response = status_line(StatusCode::RANGE_NOT_SATISFIABLE);
    let _ = write!(
        response,
        "Content-Length: 0\r\nConnection: close\r\nContent-Type: text/plain\r\nContent-Range: bytes */{length}\r\n\r\n"
    );
    response
}

/// Head of a `200`/`206` streaming response.
///
/// `range` is `None` only for an empty resource. `partial` selects `206`
/// and adds `Content-Range`.
pub fn stream_head(range: Option<ByteRange>, partial: bool, length: u64) -> String {
    let status = if partial {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let content_length = range.map_or(0, |range| range.size());

    let mut head = status_line(status);
    head.push_str("Accept-Ranges: bytes\r\n");
    head.push_str("Content-Type: application/octet-stream\r\n");
    let _ = write!(head, "Content-Length: {content_length}\r\n");
    if let (true, Some(range)) = (partial, range) {
        let _ = write!(head, "Content-Range: {}\r\n", range.content_range(length));
    }
    head.push_str("Connection: close\r\n\r\n");
    head
}

/// Writes a complete response head (or small response) and flushes it.
///
/// # Errors
/// - `std::io::Error` - The client went away or the write failed
pub async fn send<W>(writer: &mut W, response: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_format() {
        assert_eq!(
            error_response(StatusCode::NOT_FOUND),
            "HTTP/1.1 404 Not Found\r\nContent-Length: 13\r\nConnection: close\r\nContent-Type: text/plain\r\n\r\n404 Not Found"
        );
        assert!(
            error_response(StatusCode::METHOD_NOT_ALLOWED)
                .starts_with("HTTP/1.1 405 Method Not Allowed\r\n")
        );
    }

    #[test]
    fn test_range_not_satisfiable_format() {
        let response = range_not_satisfiable(1000);

        assert!(response.starts_with("HTTP/1.1 416 Range Not Satisfiable\r\n"));
        assert!(response.contains("Content-Range: bytes */1000\r\n"));
        assert!(response.contains("Content-Length: 0\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_full_stream_head() {
        let head = stream_head(ByteRange::full(1000), false, 1000);

        assert_eq!(
            head,
            "HTTP/1.1 200 OK\r\nAccept-Ranges: bytes\r\nContent-Type: application/octet-stream\r\nContent-Length: 1000\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn test_partial_stream_head() {
        let range = ByteRange {
            start: 500,
            end: 599,
        };
        let head = stream_head(Some(range), true, 1000);

        assert!(head.starts_with("HTTP/1.1 206 Partial Content\r\n"));
        assert!(head.contains("Content-Length: 100\r\n"));
        assert!(head.contains("Content-Range: bytes 500-599/1000\r\n"));
    }

    #[test]
    fn test_empty_resource_head() {
        let head = stream_head(None, false, 0);

        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("Content-Length: 0\r\n"));
        assert!(!head.contains("Content-Range"));
    }

    #[tokio::test]
    async fn test_send_writes_everything() {
        let mut out = Vec::new();
        send(&mut out, "HTTP/1.1 200 OK\r\n\r\n").await.unwrap();
        assert_eq!(out, b"HTTP/1.1 200 OK\r\n\r\n");
    }
}
