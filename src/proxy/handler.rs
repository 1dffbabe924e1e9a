//! Request routing for proxy endpoints

use crate::client::AdminResponse;
use crate::cluster::{migration, ClusterError, NodeAddr};
use crate::protocol::http::{self, HttpError, Request, Response};
use crate::proxy::ProxyState;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::{error, info, warn};

/// Read one request, route it, write the response, close.
pub async fn handle_connection(
    mut stream: TcpStream,
    state: Arc<ProxyState>,
) -> Result<(), HttpError> {
    let request = match http::read_request(&mut stream).await {
        Ok(request) => request,
        Err(HttpError::Io(err)) => return Err(HttpError::Io(err)),
        Err(_) => {
            http::write_response(&mut stream, &Response::text(400, "Bad Request")).await?;
            return Ok(());
        }
    };

    let response = route(&request, &state).await;
    http::write_response(&mut stream, &response).await
}

async fn route(request: &Request, state: &ProxyState) -> Response {
    match (request.method.as_str(), request.path.as_str()) {
        ("POST", "/put") => forward_put(request, state).await,
        ("GET", "/get") => forward_get(request, state).await,
        ("POST", "/del") => forward_del(request, state).await,
        ("POST", "/add_node") => add_node(request, state).await,
        ("POST", "/remove_node") => remove_node(request, state).await,
        ("GET", "/stats") => stats(state).await,
        _ => Response::not_found(),
    }
}

/// Resolve the owner of `key` under a ring read lock, or the 503 response
/// when the ring is empty.
async fn owner_of(state: &ProxyState, key: &str) -> Result<NodeAddr, Response> {
    let ring = state.ring.read().await;
    match ring.node_for_key(key) {
        Ok(owner) => Ok(owner.clone()),
        Err(_) => Err(Response::text(503, "No storage servers available")),
    }
}

async fn forward_put(request: &Request, state: &ProxyState) -> Response {
    let key = match request.param("key") {
        Some(key) if !key.is_empty() => key,
        _ => return Response::text(400, "Bad Request: invalid key"),
    };
    let value = match request.param("val") {
        Some(value) => value,
        None => return Response::text(400, "Bad Request: missing val"),
    };

    let owner = match owner_of(state, key).await {
        Ok(owner) => owner,
        Err(response) => return response,
    };

    match state.storage.forward_put(&owner, key, value).await {
        Ok((status, body)) => Response::text(status, body),
        Err(err) => {
            error!(key = %key, node = %owner, error = %err, "upstream put failed");
            Response::text(500, "Internal Server Error")
        }
    }
}

async fn forward_get(request: &Request, state: &ProxyState) -> Response {
    let key = match request.param("key") {
        Some(key) if !key.is_empty() => key,
        _ => return Response::text(400, "Bad Request: invalid key"),
    };

    let owner = match owner_of(state, key).await {
        Ok(owner) => owner,
        Err(response) => return response,
    };

    match state.storage.forward_get(&owner, key).await {
        Ok((status, body)) => Response::text(status, body),
        Err(err) => {
            error!(key = %key, node = %owner, error = %err, "upstream get failed");
            Response::text(500, "Internal Server Error")
        }
    }
}

async fn forward_del(request: &Request, state: &ProxyState) -> Response {
    let key = match request.param("key") {
        Some(key) if !key.is_empty() => key,
        _ => return Response::text(400, "Bad Request: invalid key"),
    };

    let owner = match owner_of(state, key).await {
        Ok(owner) => owner,
        Err(response) => return response,
    };

    match state.storage.forward_del(&owner, key).await {
        Ok((status, body)) => Response::text(status, body),
        Err(err) => {
            error!(key = %key, node = %owner, error = %err, "upstream del failed");
            Response::text(500, "Internal Server Error")
        }
    }
}

fn admin_response(node: &NodeAddr, report: migration::MigrationReport) -> Response {
    let payload = AdminResponse {
        node: node.to_string(),
        report,
    };
    json_response(&payload)
}

fn json_response<T: Serialize>(payload: &T) -> Response {
    match serde_json::to_string(payload) {
        Ok(body) => Response::json(200, body),
        Err(err) => {
            error!(error = %err, "response serialization failed");
            Response::text(500, "Internal Server Error")
        }
    }
}

async fn add_node(request: &Request, state: &ProxyState) -> Response {
    let host = match request.param("host") {
        Some(host) => host,
        None => return Response::text(400, "Bad Request: missing host"),
    };
    let addr = match NodeAddr::parse(host) {
        Ok(addr) => addr,
        Err(err) => {
            warn!(host = %host, error = %err, "rejecting add_node");
            return Response::text(400, "Bad Request: malformed host");
        }
    };

    let _admin = state.admin_lock.lock().await;

    // Probe before touching the ring; a dead node must leave no trace.
    if !state.storage.status(&addr).await {
        warn!(node = %addr, "refusing to add unreachable node");
        return Response::text(503, "Error: Target node is not reachable.");
    }
    info!(node = %addr, "health check passed, adding to ring");

    let tasks = {
        let mut ring = state.ring.write().await;
        if ring.contains(&addr) {
            info!(node = %addr, "node already in ring, skipping migration");
            return admin_response(&addr, migration::MigrationReport::default());
        }
        ring.add_node(&addr);
        ring.rebalancing_tasks(&addr)
    };

    // The ring already routes to the new node; the migrator races readers
    // and loses only the staleness window.
    let report = migration::rebalance_add(&state.storage, &addr, &tasks).await;
    admin_response(&addr, report)
}

async fn remove_node(request: &Request, state: &ProxyState) -> Response {
    let host = match request.param("host") {
        Some(host) => host,
        None => return Response::text(400, "Bad Request: missing host"),
    };
    let addr = match NodeAddr::parse(host) {
        Ok(addr) => addr,
        Err(err) => {
            warn!(host = %host, error = %err, "rejecting remove_node");
            return Response::text(400, "Bad Request: malformed host");
        }
    };

    let _admin = state.admin_lock.lock().await;

    {
        let ring = state.ring.read().await;
        if !ring.contains(&addr) {
            let err = ClusterError::NotAMember {
                address: addr.to_string(),
            };
            warn!(node = %addr, "rejecting remove_node");
            return Response::text(404, err.to_string());
        }
    }

    // Snapshot the victim before it vanishes from the ring; if the snapshot
    // fails the node is dropped anyway and its data stays where it is.
    let entries = match state.storage.all(&addr).await {
        Ok(entries) => entries,
        Err(err) => {
            warn!(node = %addr, error = %err, "snapshot failed, evacuating nothing");
            Vec::new()
        }
    };

    // Drop the victim first so incoming writes land on survivors.
    {
        let mut ring = state.ring.write().await;
        ring.remove_node(&addr);
    }

    let report = migration::evacuate(&state.storage, &state.ring, &addr, entries).await;
    admin_response(&addr, report)
}

#[derive(Serialize)]
struct RingStats {
    members: Vec<String>,
    virtual_nodes: u32,
    positions: usize,
}

async fn stats(state: &ProxyState) -> Response {
    let ring = state.ring.read().await;
    let payload = RingStats {
        members: ring
            .member_nodes()
            .iter()
            .map(|node| node.to_string())
            .collect(),
        virtual_nodes: ring.virtual_nodes(),
        positions: ring.len(),
    };
    json_response(&payload)
}
