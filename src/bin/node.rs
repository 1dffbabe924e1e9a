use anyhow::Context;
use driftkv::server::NodeServer;
use driftkv::store::Store;
use driftkv::NodeConfig;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn init_tracing(level: &str, format: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    if format == "json" {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let port: u16 = match args.next().map(|raw| raw.parse()) {
        Some(Ok(port)) => port,
        _ => {
            eprintln!("Usage: driftkv-node <PORT>");
            std::process::exit(2);
        }
    };

    let config = NodeConfig::load()
        .await
        .map_err(|err| anyhow::anyhow!(err))
        .context("loading node configuration")?;
    init_tracing(&config.logging.level, &config.logging.format);

    info!("Starting driftkv storage node v{}", driftkv::VERSION);

    let wal_path = config.wal_path(port);
    let sync_policy = config.sync_policy()?;
    let (store, _replay) = Store::open(config.num_shards, &wal_path, sync_policy)?;
    info!(
        port = port,
        shards = config.num_shards,
        wal = %wal_path.display(),
        "store ready"
    );

    let server = NodeServer::bind(&format!("{}:{}", config.bind_addr, port), Arc::new(store))
        .await
        .context("binding storage node listener")?;

    tokio::select! {
        _ = server.serve() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down storage node");
    Ok(())
}
