//! Loopcast Core - loopback HTTP streaming of remote share files
//!
//! Exposes files living on an authenticated network share as plain
//! `http://127.0.0.1:<port>/stream/<token>` byte-range resources so that a
//! media player which only understands HTTP can stream and seek within them.
//! The remote filesystem itself is reached through the [`RemoteAccess`] trait.

pub mod config;
pub mod proxy;
pub mod registry;
pub mod remote;
pub mod tracing_setup;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;

// Re-export main types for convenient access
pub use config::LoopcastConfig;
pub use proxy::{ProxyError, StatsSnapshot, StreamProxy};
pub use registry::{Descriptor, Registry, Token};
pub use remote::{LocalShare, MemoryShare, RemoteAccess, RemoteError, RemoteReader};

/// Top-level errors surfaced to collaborators of the proxy.
#[derive(Debug, thiserror::Error)]
pub enum LoopcastError {
    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    #[error("Remote share error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoopcastError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            LoopcastError::Proxy(e) => match e {
                ProxyError::Bind { address, .. } => {
                    format!("Could not start the local streaming proxy on {address}")
                }
                _ => "Streaming proxy error occurred".to_string(),
            },
            LoopcastError::Remote(e) => match e {
                RemoteError::NotFound { path } => format!("File not found on share: {path}"),
                RemoteError::AccessDenied { path } => format!("Access denied on share: {path}"),
                _ => "Remote share error occurred".to_string(),
            },
            LoopcastError::Configuration { reason } => format!("Configuration error: {reason}"),
            LoopcastError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            LoopcastError::Configuration { .. }
                | LoopcastError::Remote(RemoteError::NotFound { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, LoopcastError>;
