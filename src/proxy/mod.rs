//! Routing proxy and cluster coordinator
//!
//! Stateless on disk. In-memory state is exactly one ring behind a
//! reader/writer lock plus the outbound storage client. Data forwarders take
//! the ring as readers; admin operations take it as a writer only for the
//! mutation step, and are serialized end-to-end against each other by a
//! dedicated admin lock so that `ADD` and `REMOVE` never interleave.

pub mod handler;

use crate::client::StorageClient;
use crate::cluster::ConsistentHashRing;
use crate::config::ProxyConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

/// Shared proxy state handed to every connection task.
pub struct ProxyState {
    pub ring: RwLock<ConsistentHashRing>,
    pub storage: StorageClient,
    /// Serializes admin operations end-to-end, migration included.
    pub admin_lock: Mutex<()>,
}

/// Accept loop for the proxy.
pub struct ProxyServer {
    listener: TcpListener,
    state: Arc<ProxyState>,
}

impl ProxyServer {
    /// Bind the proxy on `addr` with the given cluster configuration.
    pub async fn bind(addr: &str, config: &ProxyConfig) -> crate::Result<Self> {
        let storage = StorageClient::new(
            Duration::from_secs(config.request_timeout_secs),
            Duration::from_secs(config.probe_timeout_secs),
        )?;
        let state = Arc::new(ProxyState {
            ring: RwLock::new(ConsistentHashRing::new(config.virtual_nodes)),
            storage,
            admin_lock: Mutex::new(()),
        });

        let listener = TcpListener::bind(addr).await?;
        info!(
            addr = %listener.local_addr()?,
            virtual_nodes = config.virtual_nodes,
            "proxy listening"
        );
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve connections until the task is dropped.
    pub async fn serve(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(err) = handler::handle_connection(stream, state).await {
                            warn!(peer = %peer, error = %err, "connection error");
                        }
                    });
                }
                Err(err) => {
                    error!(error = %err, "failed to accept connection");
                }
            }
        }
    }
}
