//! Node addressing and canonicalization

use crate::cluster::ClusterError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical `host:port` address of a storage node.
///
/// Parsing canonicalizes `localhost` to `127.0.0.1` so that two spellings of
/// the same node never produce two ring entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeAddr(String);

impl NodeAddr {
    /// Parse and canonicalize a `host:port` string.
    pub fn parse(raw: &str) -> Result<Self, ClusterError> {
        let malformed = || ClusterError::MalformedAddress {
            address: raw.to_string(),
        };

        let trimmed = raw.trim();
        let (host, port) = trimmed.split_once(':').ok_or_else(malformed)?;
        if host.is_empty() {
            return Err(malformed());
        }

        let port: u16 = port.parse().map_err(|_| malformed())?;
        if port == 0 {
            return Err(malformed());
        }

        let host = if host == "localhost" { "127.0.0.1" } else { host };
        Ok(Self(format!("{}:{}", host, port)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base URL for HTTP requests to this node.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.0)
    }

    /// The string hashed to place this node's i-th virtual node.
    pub fn vnode_key(&self, index: u32) -> String {
        format!("{}#{}", self.0, index)
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
