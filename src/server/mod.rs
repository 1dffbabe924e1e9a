//! HTTP server for the storage node

pub mod handler;

use crate::store::Store;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Accept loop for a storage node: one task per connection, one request per
/// connection.
pub struct NodeServer {
    listener: TcpListener,
    store: Arc<Store>,
}

impl NodeServer {
    /// Bind the listener; `addr` may use port 0 to take an ephemeral port.
    pub async fn bind(addr: &str, store: Arc<Store>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "storage node listening");
        Ok(Self { listener, store })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve connections until the task is dropped.
    pub async fn serve(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let store = Arc::clone(&self.store);
                    tokio::spawn(async move {
                        if let Err(err) = handler::handle_connection(stream, store).await {
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
