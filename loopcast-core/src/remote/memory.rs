//! In-memory share adapter
//!
//! Holds file contents in shared `Bytes` buffers. Supports injecting failures
//! at each adapter operation so the proxy's error mapping can be exercised
//! without a real network share.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use super::{RemoteAccess, RemoteError, RemoteReader};

/// Operation at which an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    /// `exists` returns a protocol error
    Exists,
    /// `length` returns a protocol error
    Length,
    /// `open` returns a protocol error
    Open,
    /// Reads fail once the read position reaches this offset
    ReadAfter(u64),
    /// Reads report end of data at this offset while `length` still
    /// reports the full size, like a file truncated after it was measured
    EofAfter(u64),
}

#[derive(Default)]
struct ShareState {
    files: HashMap<String, Bytes>,
    failures: HashMap<String, FailurePoint>,
}

/// Remote access over files held in memory.
///
/// Cloning yields another handle onto the same files.
#[derive(Clone, Default)]
pub struct MemoryShare {
    state: Arc<RwLock<ShareState>>,
}

impl MemoryShare {
    /// Creates an empty share.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the file at `path`.
    pub fn insert(&self, path: impl Into<String>, data: impl Into<Bytes>) {
        self.state.write().files.insert(path.into(), data.into());
    }

    /// Removes the file at `path`, returning whether it existed.
    pub fn remove(&self, path: &str) -> bool {
        self.state.write().files.remove(path).is_some()
    }

    /// Makes operations on `path` fail at `point`.
    pub fn fail_on(&self, path: impl Into<String>, point: FailurePoint) {
        self.state.write().failures.insert(path.into(), point);
    }

    fn failure(&self, path: &str) -> Option<FailurePoint> {
        self.state.read().failures.get(path).copied()
    }

    fn file(&self, path: &str) -> Result<Bytes, RemoteError> {
        self.state
            .read()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                path: path.to_string(),
            })
    }
}

fn injected(operation: &str, path: &str) -> RemoteError {
    RemoteError::Protocol(format!("injected {operation} failure for {path}"))
}

#[async_trait]
impl RemoteAccess for MemoryShare {
    async fn exists(&self, path: &str) -> Result<bool, RemoteError> {
        if self.failure(path) == Some(FailurePoint::Exists) {
            return Err(injected("exists", path));
        }
        Ok(self.state.read().files.contains_key(path))
    }

    async fn length(&self, path: &str) -> Result<u64, RemoteError> {
        if self.failure(path) == Some(FailurePoint::Length) {
            return Err(injected("length", path));
        }
        Ok(self.file(path)?.len() as u64)
    }

    async fn open(&self, path: &str) -> Result<Box<dyn RemoteReader>, RemoteError> {
        let (fail_after, eof_after) = match self.failure(path) {
            Some(FailurePoint::Open) => return Err(injected("open", path)),
            Some(FailurePoint::ReadAfter(offset)) => (Some(offset), None),
            Some(FailurePoint::EofAfter(offset)) => (None, Some(offset)),
            _ => (None, None),
        };
        Ok(Box::new(MemoryReader {
            path: path.to_string(),
            data: self.file(path)?,
            position: 0,
            fail_after,
            eof_after,
        }))
    }
}

struct MemoryReader {
    path: String,
    data: Bytes,
    position: u64,
    fail_after: Option<u64>,
    eof_after: Option<u64>,
}

#[async_trait]
impl RemoteReader for MemoryReader {
    async fn seek(&mut self, offset: u64) -> Result<(), RemoteError> {
        self.position = offset;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, RemoteError> {
        let mut limit = self.data.len() as u64;
        if let Some(fail_after) = self.fail_after {
            if self.position >= fail_after {
                return Err(injected("read", &self.path));
            }
            limit = limit.min(fail_after);
        }
        if let Some(eof_after) = self.eof_after {
            limit = limit.min(eof_after);
        }
        if self.position >= limit {
            return Ok(0);
        }

        let start = self.position as usize;
        let count = buf.len().min((limit - self.position) as usize);
        buf[..count].copy_from_slice(&self.data[start..start + count]);
        self.position += count as u64;
        Ok(count)
    }
}
