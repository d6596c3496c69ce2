//! Loopback listener and accept loop

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use super::connection::serve_connection;
use super::{ProxyError, ProxyShared};

/// Source of inbound connections for the accept loop.
#[async_trait]
pub(crate) trait Incoming: Send + 'static {
    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)>;
}

#[async_trait]
impl Incoming for TcpListener {
    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

/// Running accept loop and the port it listens on.
pub(crate) struct ListenerHandle {
    pub port: u16,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Binds the configured loopback port and spawns the accept loop.
///
/// # Errors
/// - `ProxyError::NotLoopback` - Configured bind address is not a loopback address
/// - `ProxyError::Bind` - Socket could not be bound or its port read back
pub(crate) async fn start_listener(shared: Arc<ProxyShared>) -> Result<ListenerHandle, ProxyError> {
    let ip = shared.config.bind_address;
    if !ip.is_loopback() {
        return Err(ProxyError::NotLoopback { address: ip });
    }

    let address = SocketAddr::new(ip, shared.config.port);
    let bind_error = |source| ProxyError::Bind {
        address: address.to_string(),
        source,
    };
    let listener = TcpListener::bind(address).await.map_err(bind_error)?;
    let port = listener.local_addr().map_err(bind_error)?.port();

    info!("Started stream proxy on {}:{}", ip, port);
    Ok(spawn_accept_loop(listener, port, shared))
}

/// Marks the proxy as serving and runs the accept loop over `incoming`.
pub(crate) fn spawn_accept_loop<I: Incoming>(
    incoming: I,
    port: u16,
    shared: Arc<ProxyShared>,
) -> ListenerHandle {
    shared.serving.store(true, Ordering::Release);
    let task = tokio::spawn(accept_loop(incoming, shared));
    ListenerHandle { port, task }
}

/// Accepts connections until the listening socket fails.
///
/// Each connection runs on its own task while holding one of
/// `max_connections` permits; with none left, accepting pauses.
async fn accept_loop<I: Incoming>(mut incoming: I, shared: Arc<ProxyShared>) {
    let permits = Arc::new(Semaphore::new(shared.config.max_connections.max(1)));

    loop {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };

        match incoming.accept().await {
            Ok((stream, peer_addr)) => {
                trace!("Accepted connection from {}", peer_addr);
                shared.stats.record_connection();
                let shared = shared.clone();

                tokio::spawn(async move {
                    if let Err(e) = serve_connection(stream, &shared).await {
                        debug!("Connection from {} ended: {}", peer_addr, e);
                    }
                    drop(permit);
                });
            }
            Err(e) => {
                error!("Stream proxy accept loop terminated: {}", e);
                break;
            }
        }
    }

    shared.serving.store(false, Ordering::Release);
}
