use anyhow::Context;
use driftkv::proxy::ProxyServer;
use driftkv::ProxyConfig;
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
    let config = ProxyConfig::load()
        .await
        .map_err(|err| anyhow::anyhow!(err))
        .context("loading proxy configuration")?;
    init_tracing(&config.logging.level, &config.logging.format);

    info!("Starting driftkv proxy v{}", driftkv::VERSION);

    let addr = format!("{}:{}", config.bind_addr, config.port);
    let server = ProxyServer::bind(&addr, &config)
        .await
        .map_err(|err| anyhow::anyhow!(err))
        .context("binding proxy listener")?;

    tokio::select! {
        _ = server.serve() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down proxy");
    Ok(())
}
