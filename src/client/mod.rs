//! HTTP clients for storage nodes and the proxy
//!
//! `StorageClient` is what the proxy (and the migrator) uses to drive
//! storage nodes; `ProxyClient` is the thin client-facing wrapper external
//! callers use against the proxy. Both carry per-request timeouts and never
//! retry.

use crate::cluster::{MigrationReport, NodeAddr};
use crate::protocol::pairs;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client-side errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Body of a successful admin call: which node changed membership and what
/// the migration loop did about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminResponse {
    pub node: String,
    pub report: MigrationReport,
}

/// Typed HTTP client for storage-node endpoints.
#[derive(Debug, Clone)]
pub struct StorageClient {
    http: reqwest::Client,
    probe: reqwest::Client,
}

impl StorageClient {
    /// Build a client with a data-op timeout and a (typically shorter)
    /// health-probe timeout.
    pub fn new(request_timeout: Duration, probe_timeout: Duration) -> ClientResult<Self> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        let probe = reqwest::Client::builder().timeout(probe_timeout).build()?;
        Ok(Self { http, probe })
    }

    /// Health-probe `/status`. Any transport failure or non-200 is unhealthy.
    pub async fn status(&self, node: &NodeAddr) -> bool {
        let url = format!("{}/status", node.base_url());
        match self.probe.get(&url).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(_) => false,
        }
    }

    /// Forward a PUT, relaying the node's status and body.
    pub async fn forward_put(
        &self,
        node: &NodeAddr,
        key: &str,
        value: &str,
    ) -> ClientResult<(u16, String)> {
        let url = format!("{}/put", node.base_url());
        let response = self
            .http
            .post(&url)
            .form(&[("key", key), ("val", value)])
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }

    /// Forward a DEL, relaying the node's status and body.
    pub async fn forward_del(&self, node: &NodeAddr, key: &str) -> ClientResult<(u16, String)> {
        let url = format!("{}/del", node.base_url());
        let response = self.http.post(&url).form(&[("key", key)]).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }

    /// Forward a GET, relaying the node's status and body.
    pub async fn forward_get(&self, node: &NodeAddr, key: &str) -> ClientResult<(u16, String)> {
        let url = format!("{}/get", node.base_url());
        let response = self.http.get(&url).query(&[("key", key)]).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }

    /// PUT that demands success, for the migration loop.
    pub async fn put(&self, node: &NodeAddr, key: &str, value: &str) -> ClientResult<()> {
        let (status, _) = self.forward_put(node, key, value).await?;
        if status != 200 {
            return Err(ClientError::UnexpectedStatus {
                status,
                url: format!("{}/put", node.base_url()),
            });
        }
        Ok(())
    }

    /// DEL that demands success, for the migration loop.
    pub async fn del(&self, node: &NodeAddr, key: &str) -> ClientResult<()> {
        let (status, _) = self.forward_del(node, key).await?;
        if status != 200 {
            return Err(ClientError::UnexpectedStatus {
                status,
                url: format!("{}/del", node.base_url()),
            });
        }
        Ok(())
    }

    /// GET a single key directly from a node.
    pub async fn get(&self, node: &NodeAddr, key: &str) -> ClientResult<Option<String>> {
        let (status, body) = self.forward_get(node, key).await?;
        match status {
            200 => Ok(Some(body)),
            404 => Ok(None),
            status => Err(ClientError::UnexpectedStatus {
                status,
                url: format!("{}/get", node.base_url()),
            }),
        }
    }

    /// Scan a node for entries in the hash range `(start, end]`.
    pub async fn range(
        &self,
        node: &NodeAddr,
        start: u64,
        end: u64,
    ) -> ClientResult<Vec<(String, String)>> {
        let url = format!("{}/range", node.base_url());
        let response = self
            .http
            .get(&url)
            .query(&[("start", start.to_string()), ("end", end.to_string())])
            .send()
            .await?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(ClientError::UnexpectedStatus { status, url });
        }
        let body = response.text().await?;
        Ok(pairs::decode_pairs(&body))
    }

    /// Snapshot everything a node holds.
    pub async fn all(&self, node: &NodeAddr) -> ClientResult<Vec<(String, String)>> {
        let url = format!("{}/all", node.base_url());
        let response = self.http.get(&url).send().await?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(ClientError::UnexpectedStatus { status, url });
        }
        let body = response.text().await?;
        Ok(pairs::decode_pairs(&body))
    }

    /// Clear a node's state. Test and debug use only.
    pub async fn reset(&self, node: &NodeAddr) -> ClientResult<()> {
        let url = format!("{}/reset", node.base_url());
        let response = self.http.post(&url).send().await?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(ClientError::UnexpectedStatus { status, url });
        }
        Ok(())
    }
}

/// Thin client for the proxy's public endpoints.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    http: reqwest::Client,
    base_url: String,
}

impl ProxyClient {
    pub fn new(addr: &str, timeout: Duration) -> ClientResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: format!("http://{}", addr),
        })
    }

    pub async fn put(&self, key: &str, value: &str) -> ClientResult<()> {
        let url = format!("{}/put", self.base_url);
        let response = self
            .http
            .post(&url)
            .form(&[("key", key), ("val", value)])
            .send()
            .await?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(ClientError::UnexpectedStatus { status, url });
        }
        Ok(())
    }

    pub async fn get(&self, key: &str) -> ClientResult<Option<String>> {
        let url = format!("{}/get", self.base_url);
        let response = self.http.get(&url).query(&[("key", key)]).send().await?;
        let status = response.status().as_u16();
        match status {
            200 => Ok(Some(response.text().await?)),
            404 => Ok(None),
            status => Err(ClientError::UnexpectedStatus { status, url }),
        }
    }

    pub async fn del(&self, key: &str) -> ClientResult<()> {
        let url = format!("{}/del", self.base_url);
        let response = self.http.post(&url).form(&[("key", key)]).send().await?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(ClientError::UnexpectedStatus { status, url });
        }
        Ok(())
    }

    /// Ask the proxy to admit a node, returning the migration report.
    pub async fn add_node(&self, host: &str) -> ClientResult<AdminResponse> {
        let url = format!("{}/add_node", self.base_url);
        let response = self.http.post(&url).form(&[("host", host)]).send().await?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(ClientError::UnexpectedStatus { status, url });
        }
        Ok(response.json::<AdminResponse>().await?)
    }

    /// Ask the proxy to evacuate and drop a node.
    pub async fn remove_node(&self, host: &str) -> ClientResult<AdminResponse> {
        let url = format!("{}/remove_node", self.base_url);
        let response = self.http.post(&url).form(&[("host", host)]).send().await?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(ClientError::UnexpectedStatus { status, url });
        }
        Ok(response.json::<AdminResponse>().await?)
    }
}
