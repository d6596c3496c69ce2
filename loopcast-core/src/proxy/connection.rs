//! Per-connection request handling
//!
//! Each accepted connection carries exactly one request. The handler parses
//! it, resolves the token, and streams the requested interval of the remote
//! file before closing the connection.

use std::future::Future;
use std::time::Duration;

use http::StatusCode;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use super::range::{ByteRange, resolve_range};
use super::request::{ParsedHead, RequestHead, read_request_head};
use super::response::{error_response, range_not_satisfiable, send, stream_head};
use super::{ProxyError, ProxyShared};
use crate::registry::{Descriptor, STREAM_PATH_PREFIX};
use crate::remote::RemoteReader;

/// Serves the single request carried by `stream` and closes it.
///
/// Client protocol problems are answered with a status code and return `Ok`.
///
/// # Errors
/// - `ProxyError::RequestTimeout` - Request head not received in time
/// - `ProxyError::HeaderTooLarge` - Request head over the size limit (after a `400`)
/// - `ProxyError::Io` / `ProxyError::Remote` / `ProxyError::StreamTimeout` -
///   Response could not be delivered; any bytes already sent stay sent
pub(crate) async fn serve_connection(
    stream: TcpStream,
    shared: &ProxyShared,
) -> Result<(), ProxyError> {
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let config = &shared.config;

    let parsed = timeout(
        config.request_timeout,
        read_request_head(&mut reader, config.max_header_bytes),
    )
    .await
    .map_err(|_| ProxyError::RequestTimeout)?;

    let result = match parsed {
        Ok(ParsedHead::Request(head)) => route_request(&head, &mut writer, shared).await,
        Ok(ParsedHead::Closed) => return Ok(()),
        Ok(ParsedHead::Malformed) => respond(&mut writer, shared, StatusCode::BAD_REQUEST).await,
        Err(ProxyError::HeaderTooLarge) => {
            respond(&mut writer, shared, StatusCode::BAD_REQUEST).await?;
            Err(ProxyError::HeaderTooLarge)
        }
        Err(e) => Err(e),
    };

    // Best effort; the peer may already be gone
    let _ = writer.shutdown().await;
    result
}

async fn route_request<W>(
    head: &RequestHead,
    writer: &mut W,
    shared: &ProxyShared,
) -> Result<(), ProxyError>
where
    W: AsyncWrite + Unpin,
{
    let head_only = match head.method.as_str() {
        "GET" => false,
        "HEAD" => true,
        _ => return respond(writer, shared, StatusCode::METHOD_NOT_ALLOWED).await,
    };

    let Some(token) = head.path.strip_prefix(STREAM_PATH_PREFIX) else {
        return respond(writer, shared, StatusCode::NOT_FOUND).await;
    };

    let Some(descriptor) = shared.registry.lookup(token) else {
        debug!("Unknown stream token requested: {}", token);
        return respond(writer, shared, StatusCode::NOT_FOUND).await;
    };

    debug!(
        method = %head.method,
        path = %descriptor.path,
        range = head.header("range").unwrap_or("-"),
        "Serving stream request"
    );

    serve_descriptor(&descriptor, head.header("range"), head_only, writer, shared).await
}

async fn serve_descriptor<W>(
    descriptor: &Descriptor,
    range_header: Option<&str>,
    head_only: bool,
    writer: &mut W,
    shared: &ProxyShared,
) -> Result<(), ProxyError>
where
    W: AsyncWrite + Unpin,
{
    let io_timeout = shared.config.io_timeout;
    let remote = &descriptor.remote;
    let path = descriptor.path.as_str();

    match within(io_timeout, remote.exists(path)).await {
        Ok(true) => {}
        Ok(false) => return respond(writer, shared, StatusCode::NOT_FOUND).await,
        Err(e) => {
            warn!("Existence check failed for {}: {}", path, e);
            return respond(writer, shared, StatusCode::INTERNAL_SERVER_ERROR).await;
        }
    }

    let length = match within(io_timeout, remote.length(path)).await {
        Ok(length) => length,
        Err(e) => {
            warn!("Failed to get remote file length for {}: {}", path, e);
            return respond(writer, shared, StatusCode::INTERNAL_SERVER_ERROR).await;
        }
    };

    let (range, partial) = match range_header {
        None => (ByteRange::full(length), false),
        Some(value) => match resolve_range(value, length) {
            Ok(range) => (Some(range), true),
            Err(_) => {
                debug!("Unsatisfiable range {:?} for {} ({} bytes)", value, path, length);
                shared.stats.record_response(StatusCode::RANGE_NOT_SATISFIABLE);
                send(writer, &range_not_satisfiable(length)).await?;
                return Ok(());
            }
        },
    };

    let mut reader = match within(io_timeout, remote.open(path)).await {
        Ok(reader) => reader,
        Err(e) => {
            warn!("Failed to open remote file {}: {}", path, e);
            return respond(writer, shared, StatusCode::INTERNAL_SERVER_ERROR).await;
        }
    };

    within(io_timeout, send(writer, &stream_head(range, partial, length))).await?;
    shared.stats.record_response(if partial {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    });

    let Some(range) = range else {
        return Ok(());
    };
    if head_only {
        return Ok(());
    }

    match copy_range(reader.as_mut(), range, writer, shared).await {
        Ok(written) => {
            debug!(
                "Streamed {} of {} bytes from {} (range {}-{})",
                written,
                range.size(),
                path,
                range.start,
                range.end
            );
            Ok(())
        }
        Err(e) => {
            shared.stats.record_aborted_stream();
            Err(e)
        }
    }
}

/// Copies `range` from the remote reader to the client in fixed-size chunks.
///
/// Stops quietly if the remote source ends early and returns the number of
/// bytes written.
async fn copy_range<W>(
    reader: &mut dyn RemoteReader,
    range: ByteRange,
    writer: &mut W,
    shared: &ProxyShared,
) -> Result<u64, ProxyError>
where
    W: AsyncWrite + Unpin,
{
    let io_timeout = shared.config.io_timeout;
    within(io_timeout, reader.seek(range.start)).await?;

    let mut remaining = range.size();
    let chunk_size = shared.config.chunk_size.max(1);
    let mut buf = vec![0u8; clamp_to_usize(remaining).min(chunk_size)];
    let mut written = 0u64;

    while remaining > 0 {
        let want = clamp_to_usize(remaining).min(buf.len());
        let read = within(io_timeout, reader.read(&mut buf[..want])).await?;
        if read == 0 {
            trace!("Remote source ended with {} bytes outstanding", remaining);
            break;
        }
        within(io_timeout, writer.write_all(&buf[..read])).await?;
        remaining -= read as u64;
        written += read as u64;
        shared.stats.record_bytes(read as u64);
    }

    within(io_timeout, writer.flush()).await?;
    Ok(written)
}

async fn respond<W>(writer: &mut W, shared: &ProxyShared, status: StatusCode) -> Result<(), ProxyError>
where
    W: AsyncWrite + Unpin,
{
    shared.stats.record_response(status);
    if let Err(e) = send(writer, &error_response(status)).await {
        debug!("Failed to send {} response: {}", status.as_u16(), e);
    }
    Ok(())
}

/// Runs an I/O step under the connection's deadline.
async fn within<T, E>(
    limit: Duration,
    step: impl Future<Output = Result<T, E>>,
) -> Result<T, ProxyError>
where
    E: Into<ProxyError>,
{
    match timeout(limit, step).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(ProxyError::StreamTimeout),
    }
}

fn clamp_to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}
