//! Remote access abstraction for network share files
//!
//! The proxy never speaks the share protocol itself. Callers hand it an
//! authenticated [`RemoteAccess`] handle; the proxy only asks it whether a
//! path exists, how long it is, and for a seekable reader over its bytes.

pub mod local;
pub mod memory;

use async_trait::async_trait;
pub use local::LocalShare;
pub use memory::{FailurePoint, MemoryShare};

/// Errors reported by a remote access adapter.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Path does not exist on the share
    #[error("Remote path not found: {path}")]
    NotFound {
        /// Path that was looked up
        path: String,
    },

    /// Authentication context does not grant access to the path
    #[error("Access denied for remote path: {path}")]
    AccessDenied {
        /// Path that was refused
        path: String,
    },

    /// Share protocol level failure
    #[error("Remote protocol error: {0}")]
    Protocol(String),

    /// Underlying I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

/// Authenticated handle onto a remote filesystem.
///
/// One handle is shared by every registration made under the same
/// authentication context; the proxy holds it behind an `Arc` and never
/// closes it.
#[async_trait]
pub trait RemoteAccess: Send + Sync {
    /// Checks whether `path` exists on the share.
    ///
    /// # Errors
    /// - `RemoteError::AccessDenied` - Context may not query the path
    /// - `RemoteError::Protocol` / `RemoteError::Io` - Share unreachable
    async fn exists(&self, path: &str) -> Result<bool, RemoteError>;

    /// Returns the current length of `path` in bytes.
    ///
    /// # Errors
    /// - `RemoteError::NotFound` - Path disappeared since the existence check
    /// - `RemoteError::Protocol` / `RemoteError::Io` - Share unreachable
    async fn length(&self, path: &str) -> Result<u64, RemoteError>;

    /// Opens `path` for seekable reading.
    ///
    /// # Errors
    /// - `RemoteError::NotFound` - Path does not exist
    /// - `RemoteError::AccessDenied` - Context may not read the path
    /// - `RemoteError::Protocol` / `RemoteError::Io` - Share unreachable
    async fn open(&self, path: &str) -> Result<Box<dyn RemoteReader>, RemoteError>;
}

/// Seekable byte reader over one remote file.
#[async_trait]
pub trait RemoteReader: Send {
    /// Moves the read position to the absolute byte `offset`.
    ///
    /// # Errors
    /// - `RemoteError::Io` / `RemoteError::Protocol` - Seek failed remotely
    async fn seek(&mut self, offset: u64) -> Result<(), RemoteError>;

    /// Reads up to `buf.len()` bytes; `Ok(0)` signals end of data.
    ///
    /// # Errors
    /// - `RemoteError::Io` / `RemoteError::Protocol` - Read failed remotely
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, RemoteError>;
}
