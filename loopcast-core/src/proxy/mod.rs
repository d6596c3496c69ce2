//! Loopback HTTP streaming proxy
//!
//! [`StreamProxy`] is the single service collaborators talk to. Registering a
//! remote file yields an `http://127.0.0.1:<port>/stream/<token>` URL; the
//! loopback listener is started lazily by the first registration and then
//! serves `GET`/`HEAD` byte-range requests for every issued token.

mod connection;
mod listener;
pub mod range;
pub mod request;
pub mod response;
pub mod stats;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};

pub use range::{ByteRange, Unsatisfiable, resolve_range};
pub use stats::{ProxyStats, StatsSnapshot};
use tokio::sync::Mutex;
use tracing::info;

use self::listener::{ListenerHandle, start_listener};
use crate::config::{LoopcastConfig, ProxyConfig};
use crate::registry::{Registry, STREAM_PATH_PREFIX, Token};
use crate::remote::{RemoteAccess, RemoteError};

/// Errors raised by the streaming proxy.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Loopback socket could not be bound
    #[error("Failed to bind stream proxy on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Configured bind address would expose the proxy beyond this host
    #[error("Stream proxy must bind a loopback address, got {address}")]
    NotLoopback { address: IpAddr },

    #[error("Request head not received before the deadline")]
    RequestTimeout,

    #[error("Request head exceeds the size limit")]
    HeaderTooLarge,

    #[error("Streaming step exceeded the I/O deadline")]
    StreamTimeout,

    #[error("Remote share error: {0}")]
    Remote(#[from] RemoteError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// State shared between the service object and connection tasks.
pub(crate) struct ProxyShared {
    pub registry: Registry,
    pub stats: ProxyStats,
    pub config: ProxyConfig,
    /// True while an accept loop is running
    pub serving: AtomicBool,
}

impl ProxyShared {
    pub(crate) fn new(config: LoopcastConfig) -> Self {
        Self {
            registry: Registry::new(config.registry.registration_ttl),
            stats: ProxyStats::default(),
            config: config.proxy,
            serving: AtomicBool::new(false),
        }
    }
}

/// Loopback streaming proxy service.
///
/// Construct once and share it as `Arc<StreamProxy>` with every collaborator
/// that registers files. Dropping the last handle stops the accept loop.
pub struct StreamProxy {
    shared: Arc<ProxyShared>,
    started: AtomicBool,
    port: AtomicU16,
    listener: Mutex<Option<ListenerHandle>>,
}

impl StreamProxy {
    /// Creates a proxy; no socket is bound until first use.
    pub fn new(config: LoopcastConfig) -> Self {
        Self {
            shared: Arc::new(ProxyShared::new(config)),
            started: AtomicBool::new(false),
            port: AtomicU16::new(0),
            listener: Mutex::new(None),
        }
    }

    /// Starts the loopback listener if it is not running yet.
    ///
    /// Idempotent and safe to race: at most one bind ever succeeds. A failed
    /// bind leaves the proxy unstarted so a later call may retry. Returns the
    /// listening port.
    ///
    /// # Errors
    /// - `ProxyError::Bind` - Loopback socket could not be bound
    /// - `ProxyError::NotLoopback` - Configured address is not loopback
    pub async fn ensure_started(&self) -> Result<u16, ProxyError> {
        if self.started.load(Ordering::Acquire) {
            return Ok(self.port.load(Ordering::Acquire));
        }

        let mut listener = self.listener.lock().await;
        if self.started.load(Ordering::Acquire) {
            return Ok(self.port.load(Ordering::Acquire));
        }

        let handle = start_listener(self.shared.clone()).await?;
        let port = handle.port;
        *listener = Some(handle);
        self.port.store(port, Ordering::Release);
        self.started.store(true, Ordering::Release);
        Ok(port)
    }

    /// Registers a remote file and returns the URL that streams it.
    ///
    /// Starts the listener on first use. Nothing is registered if the
    /// listener cannot be started.
    ///
    /// # Errors
    /// - `ProxyError::Bind` / `ProxyError::NotLoopback` - Listener start failed
    pub async fn register(
        &self,
        remote: Arc<dyn RemoteAccess>,
        path: impl Into<String>,
        display_name: Option<String>,
    ) -> Result<String, ProxyError> {
        let port = self.ensure_started().await?;
        let path = path.into();
        let token = self.shared.registry.insert(remote, path.clone(), display_name);
        info!("Registered {} for streaming as token {}", path, token);
        Ok(self.stream_url(port, &token))
    }

    /// Display name stored for a previously issued URL.
    ///
    /// Unknown tokens and malformed URLs yield `None`.
    pub fn resolve_display_name(&self, url: &str) -> Option<String> {
        self.shared.registry.display_name(Token::from_url(url)?)
    }

    /// Revokes a token; later requests for it receive `404`.
    pub fn revoke(&self, token: &str) -> bool {
        let removed = self.shared.registry.revoke(token);
        if removed {
            info!("Revoked stream token {}", token);
        }
        removed
    }

    /// Revokes the token embedded in a previously issued URL.
    pub fn revoke_url(&self, url: &str) -> bool {
        Token::from_url(url).is_some_and(|token| self.revoke(token))
    }

    /// Listening port, once the listener has started.
    pub fn port(&self) -> Option<u16> {
        self.started
            .load(Ordering::Acquire)
            .then(|| self.port.load(Ordering::Acquire))
    }

    /// Whether the accept loop is running.
    ///
    /// Turns false for good if the listening socket fails after startup.
    pub fn is_serving(&self) -> bool {
        self.shared.serving.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    fn stream_url(&self, port: u16, token: &Token) -> String {
        let address = SocketAddr::new(self.shared.config.bind_address, port);
        format!("http://{address}{STREAM_PATH_PREFIX}{token}")
    }
}

impl Default for StreamProxy {
    fn default() -> Self {
        Self::new(LoopcastConfig::default())
    }
}

impl Drop for StreamProxy {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::remote::MemoryShare;

    fn share_with(path: &str, len: usize) -> Arc<dyn RemoteAccess> {
        let share = MemoryShare::new();
        share.insert(path, vec![7u8; len]);
        Arc::new(share)
    }

    #[tokio::test]
    async fn test_not_started_until_first_registration() {
        let proxy = StreamProxy::new(LoopcastConfig::for_testing());

        assert_eq!(proxy.port(), None);
        assert!(!proxy.is_serving());

        let url = proxy
            .register(share_with("a.mkv", 10), "a.mkv", None)
            .await
            .unwrap();
        let port = proxy.port().unwrap();

        assert!(proxy.is_serving());
        assert!(url.starts_with(&format!("http://127.0.0.1:{port}/stream/")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_ensure_started_is_idempotent() {
        let proxy = Arc::new(StreamProxy::new(LoopcastConfig::for_testing()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let proxy = proxy.clone();
                tokio::spawn(async move { proxy.ensure_started().await.unwrap() })
            })
            .collect();

        let mut ports = Vec::new();
        for handle in handles {
            ports.push(handle.await.unwrap());
        }
        ports.dedup();
        assert_eq!(ports.len(), 1);
        assert_eq!(proxy.port(), Some(ports[0]));
    }

    #[tokio::test]
    async fn test_non_loopback_address_rejected() {
        let mut config = LoopcastConfig::for_testing();
        config.proxy.bind_address = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        let proxy = StreamProxy::new(config);

        let result = proxy.register(share_with("a.mkv", 10), "a.mkv", None).await;

        assert!(matches!(result, Err(ProxyError::NotLoopback { .. })));
        assert_eq!(proxy.port(), None);
        assert!(proxy.registry().is_empty());
    }

    #[tokio::test]
    async fn test_failed_start_is_retried() {
        let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let taken = blocker.local_addr().unwrap().port();
        let mut config = LoopcastConfig::for_testing();
        config.proxy.port = taken;
        let proxy = StreamProxy::new(config);

        let result = proxy.register(share_with("a.mkv", 10), "a.mkv", None).await;
        assert!(matches!(result, Err(ProxyError::Bind { .. })));
        assert_eq!(proxy.port(), None);
        assert!(!proxy.is_serving());
        assert!(proxy.registry().is_empty());

        drop(blocker);

        let url = proxy
            .register(share_with("a.mkv", 10), "a.mkv", None)
            .await
            .unwrap();
        assert_eq!(proxy.port(), Some(taken));
        assert!(proxy.is_serving());
        assert!(url.starts_with(&format!("http://127.0.0.1:{taken}/stream/")));
    }

    #[tokio::test]
    async fn test_display_name_resolution() {
        let proxy = StreamProxy::new(LoopcastConfig::for_testing());
        let url = proxy
            .register(share_with("a.mkv", 10), "a.mkv", Some("Movie A".to_string()))
            .await
            .unwrap();
        let unnamed = proxy
            .register(share_with("b.mkv", 10), "b.mkv", None)
            .await
            .unwrap();

        assert_eq!(proxy.resolve_display_name(&url), Some("Movie A".to_string()));
        assert_eq!(proxy.resolve_display_name(&unnamed), None);
        assert_eq!(proxy.resolve_display_name("http://127.0.0.1:1/stream/nope"), None);
        assert_eq!(proxy.resolve_display_name("not a url"), None);
    }

    #[tokio::test]
    async fn test_revoke_url() {
        let proxy = StreamProxy::new(LoopcastConfig::for_testing());
        let url = proxy
            .register(share_with("a.mkv", 10), "a.mkv", Some("A".to_string()))
            .await
            .unwrap();

        assert!(proxy.revoke_url(&url));
        assert!(!proxy.revoke_url(&url));
        assert_eq!(proxy.resolve_display_name(&url), None);
        assert!(!proxy.revoke_url("garbage"));
    }
}
