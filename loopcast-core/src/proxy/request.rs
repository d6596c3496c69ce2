//! Minimal HTTP/1.x request head parsing
//!
//! Reads the request line and header block of a single request. Bodies,
//! continuation lines and pipelining are not supported; one connection carries
//! exactly one request.

use std::collections::HashMap;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use super::ProxyError;

/// Parsed request line and headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub path: String,
    /// Header names are lowercased; the last duplicate wins
    pub headers: HashMap<String, String>,
}

impl RequestHead {
    /// Looks up a header by lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Outcome of reading a request head from a connection.
#[derive(Debug, PartialEq, Eq)]
pub enum ParsedHead {
    /// Peer closed the connection before sending a request line
    Closed,
    /// Request line did not contain both a method and a path
    Malformed,
    Request(RequestHead),
}

/// Reads one request head of at most `max_bytes` bytes.
///
/// # Errors
/// - `ProxyError::HeaderTooLarge` - Request line plus headers exceed `max_bytes`
/// - `ProxyError::Io` - Reading from the connection failed
pub async fn read_request_head<R>(reader: &mut R, max_bytes: usize) -> Result<ParsedHead, ProxyError>
where
    R: AsyncBufRead + Unpin,
{
    let mut budget = max_bytes;

    let Some(request_line) = read_line(reader, &mut budget).await? else {
        return Ok(ParsedHead::Closed);
    };

    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(path)) = (parts.next(), parts.next()) else {
        return Ok(ParsedHead::Malformed);
    };
    let method = method.to_string();
    let path = path.to_string();

    let mut headers = HashMap::new();
    while let Some(line) = read_line(reader, &mut budget).await? {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if !name.is_empty() {
                headers.insert(name.to_ascii_lowercase(), value.trim().to_string());
            }
        }
    }

    Ok(ParsedHead::Request(RequestHead {
        method,
        path,
        headers,
    }))
}

/// Reads one line without its terminator, charging its length to `budget`.
///
/// Returns `None` at end of stream.
async fn read_line<R>(reader: &mut R, budget: &mut usize) -> Result<Option<String>, ProxyError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let limit = budget.saturating_add(1) as u64;
    let read = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if read == 0 {
        return Ok(None);
    }
    if read > *budget {
        return Err(ProxyError::HeaderTooLarge);
    }
    *budget -= read;

    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

#[cfg(test)]
mod tests {
    use tokio::io::BufReader;

    use super::*;

    async fn parse(raw: &[u8]) -> Result<ParsedHead, ProxyError> {
        let mut reader = BufReader::new(raw);
        read_request_head(&mut reader, 1024).await
    }

    #[tokio::test]
    async fn test_parse_get_with_headers() {
        let head = parse(b"GET /stream/abc HTTP/1.1\r\nHost: 127.0.0.1\r\nRange: bytes=0-99\r\n\r\n")
            .await
            .unwrap();

        let ParsedHead::Request(head) = head else {
            panic!("expected request, got {head:?}");
        };
        assert_eq!(head.method, "GET");
        assert_eq!(head.path, "/stream/abc");
        assert_eq!(head.header("range"), Some("bytes=0-99"));
        assert_eq!(head.header("host"), Some("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_header_names_case_folded_last_wins() {
        let head = parse(b"HEAD /x HTTP/1.1\r\nRANGE: bytes=0-1\r\nrange: bytes=5-9\r\nbogus line\r\n: empty\r\n\r\n")
            .await
            .unwrap();

        let ParsedHead::Request(head) = head else {
            panic!("expected request, got {head:?}");
        };
        assert_eq!(head.header("range"), Some("bytes=5-9"));
        assert_eq!(head.headers.len(), 1);
    }

    #[tokio::test]
    async fn test_headers_end_at_eof() {
        let head = parse(b"GET /stream/t HTTP/1.1\nX-Test: 1").await.unwrap();

        let ParsedHead::Request(head) = head else {
            panic!("expected request, got {head:?}");
        };
        assert_eq!(head.header("x-test"), Some("1"));
    }

    #[tokio::test]
    async fn test_closed_and_malformed() {
        assert_eq!(parse(b"").await.unwrap(), ParsedHead::Closed);
        assert_eq!(parse(b"GET\r\n\r\n").await.unwrap(), ParsedHead::Malformed);
        assert_eq!(parse(b"\r\n").await.unwrap(), ParsedHead::Malformed);
    }

    #[tokio::test]
    async fn test_oversized_head_rejected() {
        let mut raw = b"GET /stream/abc HTTP/1.1\r\n".to_vec();
        raw.extend_from_slice(format!("X-Padding: {}\r\n\r\n", "a".repeat(2000)).as_bytes());

        let result = parse(&raw).await;
        assert!(matches!(result, Err(ProxyError::HeaderTooLarge)));
    }

    #[tokio::test]
    async fn test_head_split_across_reads() {
        let mock = tokio_test::io::Builder::new()
            .read(b"GET /stream/")
            .read(b"abc HTTP/1.1\r\nRan")
            .read(b"ge: bytes=10-\r\n")
            .read(b"\r\n")
            .build();
        let mut reader = BufReader::new(mock);

        let head = read_request_head(&mut reader, 1024).await.unwrap();

        let ParsedHead::Request(head) = head else {
            panic!("expected request, got {head:?}");
        };
        assert_eq!(head.path, "/stream/abc");
        assert_eq!(head.header("range"), Some("bytes=10-"));
    }
}
