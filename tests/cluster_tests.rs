//! End-to-end cluster tests: real sockets, real migration
//!
//! Each test spins up its own storage nodes and proxy on ephemeral ports and
//! drives them over HTTP. The node stores stay reachable through their
//! `Arc` handles so tests can assert on exactly which node holds a key.

use driftkv::client::{ClientError, ProxyClient};
use driftkv::cluster::{ConsistentHashRing, NodeAddr};
use driftkv::config::ProxyConfig;
use driftkv::proxy::ProxyServer;
use driftkv::server::NodeServer;
use driftkv::store::Store;
use driftkv::wal::SyncPolicy;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const VNODES: u32 = 100;

async fn spawn_node(dir: &TempDir, wal_name: &str) -> (NodeAddr, Arc<Store>) {
    let (store, _) = Store::open(16, dir.path().join(wal_name), SyncPolicy::Flush).unwrap();
    let store = Arc::new(store);
    let server = NodeServer::bind("127.0.0.1:0", Arc::clone(&store))
        .await
        .unwrap();
    let addr = NodeAddr::parse(&server.local_addr().unwrap().to_string()).unwrap();
    tokio::spawn(server.serve());
    (addr, store)
}

async fn spawn_proxy() -> ProxyClient {
    let config = ProxyConfig {
        bind_addr: "127.0.0.1".to_string(),
        port: 0,
        virtual_nodes: VNODES,
        request_timeout_secs: 5,
        probe_timeout_secs: 2,
        logging: Default::default(),
    };
    let server = ProxyServer::bind("127.0.0.1:0", &config).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.serve());
    ProxyClient::new(&addr.to_string(), Duration::from_secs(10)).unwrap()
}

fn status_of(err: &ClientError) -> Option<u16> {
    match err {
        ClientError::UnexpectedStatus { status, .. } => Some(*status),
        ClientError::Transport(_) => None,
    }
}

#[tokio::test]
async fn empty_ring_returns_503() {
    let proxy = spawn_proxy().await;

    let err = proxy.get("anything").await.unwrap_err();
    assert_eq!(status_of(&err), Some(503));

    let err = proxy.put("anything", "v").await.unwrap_err();
    assert_eq!(status_of(&err), Some(503));
}

#[tokio::test]
async fn single_node_put_get() {
    let dir = TempDir::new().unwrap();
    let (node, _store) = spawn_node(&dir, "wal_a.log").await;
    let proxy = spawn_proxy().await;

    let response = proxy.add_node(node.as_str()).await.unwrap();
    assert_eq!(response.node, node.to_string());
    assert_eq!(response.report.keys_moved, 0);

    proxy.put("foo", "bar").await.unwrap();
    assert_eq!(proxy.get("foo").await.unwrap().as_deref(), Some("bar"));
    assert_eq!(proxy.get("missing").await.unwrap(), None);

    let wal = std::fs::read_to_string(dir.path().join("wal_a.log")).unwrap();
    assert_eq!(wal, "SET foo bar\n");
}

#[tokio::test]
async fn three_node_distribution() {
    let dir = TempDir::new().unwrap();
    let proxy = spawn_proxy().await;

    let mut stores = Vec::new();
    for name in ["wal_a.log", "wal_b.log", "wal_c.log"] {
        let (addr, store) = spawn_node(&dir, name).await;
        proxy.add_node(addr.as_str()).await.unwrap();
        stores.push(store);
    }

    for i in 0..30 {
        proxy
            .put(&format!("user_{}", i), &format!("person {}", i))
            .await
            .unwrap();
    }

    for i in 0..30 {
        assert_eq!(
            proxy.get(&format!("user_{}", i)).await.unwrap(),
            Some(format!("person {}", i))
        );
    }

    let mut populated = 0;
    let mut total = 0;
    for store in &stores {
        let keys = store.total_keys().await;
        total += keys;
        if keys > 0 {
            populated += 1;
        }
    }
    assert_eq!(total, 30);
    assert!(populated >= 2, "keys landed on {} node(s)", populated);
}

#[tokio::test]
async fn online_add_migrates_exactly_the_moved_ranges() {
    let dir = TempDir::new().unwrap();
    let proxy = spawn_proxy().await;

    let (node1, store1) = spawn_node(&dir, "wal_a.log").await;
    proxy.add_node(node1.as_str()).await.unwrap();

    for i in 0..20 {
        proxy
            .put(&format!("k{}", i), &format!("v{}", i))
            .await
            .unwrap();
    }
    assert_eq!(store1.total_keys().await, 20);

    let (node2, store2) = spawn_node(&dir, "wal_b.log").await;
    let response = proxy.add_node(node2.as_str()).await.unwrap();
    assert!(response.report.clean());

    // Recompute expected ownership with an identical ring.
    let mut ring = ConsistentHashRing::new(VNODES);
    ring.add_node(&node1);
    ring.add_node(&node2);

    let mut expected_moved = 0;
    for i in 0..20 {
        let key = format!("k{}", i);
        let value = format!("v{}", i);
        let owner = ring.node_for_key(&key).unwrap().clone();

        if owner == node2 {
            expected_moved += 1;
            assert_eq!(store2.get(&key).await.as_deref(), Some(value.as_str()));
            assert_eq!(store1.get(&key).await, None);
        } else {
            assert_eq!(store1.get(&key).await.as_deref(), Some(value.as_str()));
            assert_eq!(store2.get(&key).await, None);
        }

        // Whoever holds it, the proxy still serves it.
        assert_eq!(proxy.get(&key).await.unwrap(), Some(value));
    }
    assert_eq!(response.report.keys_moved, expected_moved);
}

#[tokio::test]
async fn duplicate_add_skips_migration() {
    let dir = TempDir::new().unwrap();
    let proxy = spawn_proxy().await;

    let (node, store) = spawn_node(&dir, "wal_a.log").await;
    proxy.add_node(node.as_str()).await.unwrap();
    proxy.put("foo", "bar").await.unwrap();

    let response = proxy.add_node(node.as_str()).await.unwrap();
    assert_eq!(response.report.keys_scanned, 0);
    assert_eq!(response.report.keys_moved, 0);
    assert_eq!(store.total_keys().await, 1);
    assert_eq!(proxy.get("foo").await.unwrap().as_deref(), Some("bar"));
}

#[tokio::test]
async fn evacuation_rehomes_every_key() {
    let dir = TempDir::new().unwrap();
    let proxy = spawn_proxy().await;

    let (node1, _store1) = spawn_node(&dir, "wal_a.log").await;
    let (node2, store2) = spawn_node(&dir, "wal_b.log").await;
    proxy.add_node(node1.as_str()).await.unwrap();
    proxy.add_node(node2.as_str()).await.unwrap();

    for i in 0..50 {
        proxy
            .put(&format!("record_{}", i), &format!("payload_{}", i))
            .await
            .unwrap();
    }

    let victim_keys = store2.total_keys().await;
    let response = proxy.remove_node(node2.as_str()).await.unwrap();
    assert!(response.report.clean());
    assert_eq!(response.report.keys_moved as usize, victim_keys);

    // Every key survives the evacuation and the victim is drained.
    for i in 0..50 {
        assert_eq!(
            proxy.get(&format!("record_{}", i)).await.unwrap(),
            Some(format!("payload_{}", i))
        );
    }
    assert_eq!(store2.total_keys().await, 0);

    // The ring no longer routes anything to the victim.
    for i in 50..70 {
        proxy
            .put(&format!("record_{}", i), "late")
            .await
            .unwrap();
    }
    assert_eq!(store2.total_keys().await, 0);
}

#[tokio::test]
async fn remove_unknown_node_is_404() {
    let proxy = spawn_proxy().await;
    let err = proxy.remove_node("127.0.0.1:6553").await.unwrap_err();
    assert_eq!(status_of(&err), Some(404));
}

#[tokio::test]
async fn refuse_dead_node_leaves_ring_untouched() {
    let dir = TempDir::new().unwrap();
    let proxy = spawn_proxy().await;

    let (node, _store) = spawn_node(&dir, "wal_a.log").await;
    proxy.add_node(node.as_str()).await.unwrap();
    proxy.put("stable", "value").await.unwrap();

    // A bound listener that never accepts: the health probe times out.
    let dead = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead_addr = dead.local_addr().unwrap().to_string();

    let err = proxy.add_node(&dead_addr).await.unwrap_err();
    assert_eq!(status_of(&err), Some(503));

    // Routing is unchanged.
    assert_eq!(proxy.get("stable").await.unwrap().as_deref(), Some("value"));
}

#[tokio::test]
async fn malformed_host_is_rejected() {
    let proxy = spawn_proxy().await;

    let err = proxy.add_node("not-an-address").await.unwrap_err();
    assert_eq!(status_of(&err), Some(400));

    let err = proxy.add_node("host:not_a_port").await.unwrap_err();
    assert_eq!(status_of(&err), Some(400));
}

#[tokio::test]
async fn localhost_and_loopback_are_one_ring_member() {
    let dir = TempDir::new().unwrap();
    let proxy = spawn_proxy().await;

    let (node, store) = spawn_node(&dir, "wal_a.log").await;
    let port = node.as_str().rsplit(':').next().unwrap();

    proxy.add_node(&format!("localhost:{}", port)).await.unwrap();
    proxy.put("foo", "bar").await.unwrap();

    // Re-adding under the canonical spelling is the same member.
    let response = proxy.add_node(node.as_str()).await.unwrap();
    assert_eq!(response.report.keys_moved, 0);
    assert_eq!(store.total_keys().await, 1);
}
