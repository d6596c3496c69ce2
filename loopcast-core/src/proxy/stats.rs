//! Proxy activity counters

use std::sync::atomic::{AtomicU64, Ordering};

use http::StatusCode;

/// Lock-free counters updated by connection handlers.
#[derive(Debug, Default)]
pub struct ProxyStats {
    connections: AtomicU64,
    success_responses: AtomicU64,
    client_errors: AtomicU64,
    server_errors: AtomicU64,
    bytes_streamed: AtomicU64,
    aborted_streams: AtomicU64,
}

/// Point-in-time copy of [`ProxyStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Connections accepted by the listener
    pub connections: u64,
    /// `200`/`206` responses whose head was sent
    pub success_responses: u64,
    /// `4xx` responses
    pub client_errors: u64,
    /// `5xx` responses
    pub server_errors: u64,
    /// Body bytes written to clients
    pub bytes_streamed: u64,
    /// Streams cut short by an I/O error or deadline
    pub aborted_streams: u64,
}

impl ProxyStats {
    pub fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response(&self, status: StatusCode) {
        let counter = if status.is_success() {
            &self.success_responses
        } else if status.is_client_error() {
            &self.client_errors
        } else {
            &self.server_errors
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes(&self, bytes: u64) {
        self.bytes_streamed.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_aborted_stream(&self) {
        self.aborted_streams.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections: self.connections.load(Ordering::Relaxed),
            success_responses: self.success_responses.load(Ordering::Relaxed),
            client_errors: self.client_errors.load(Ordering::Relaxed),
            server_errors: self.server_errors.load(Ordering::Relaxed),
            bytes_streamed: self.bytes_streamed.load(Ordering::Relaxed),
            aborted_streams: self.aborted_streams.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_responses_bucketed_by_class() {
        let stats = ProxyStats::default();
        stats.record_connection();
        stats.record_response(StatusCode::OK);
        stats.record_response(StatusCode::PARTIAL_CONTENT);
        stats.record_response(StatusCode::NOT_FOUND);
        stats.record_response(StatusCode::RANGE_NOT_SATISFIABLE);
        stats.record_response(StatusCode::INTERNAL_SERVER_ERROR);
        stats.record_bytes(1000);
        stats.record_aborted_stream();

        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                connections: 1,
                success_responses: 2,
                client_errors: 2,
                server_errors: 1,
                bytes_streamed: 1000,
                aborted_streams: 1,
            }
        );
    }
}
