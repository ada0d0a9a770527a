use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use turnstile::config::Config;
use turnstile::proxy::LoadBalancer;
use turnstile::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load().context("invalid configuration")?;

    // Any bad upstream address stops startup before the port is bound.
    let balancer = LoadBalancer::from_config(&cfg)
        .context("failed to build load balancer")?;
    let balancer = Arc::new(balancer);
    let listen_addr = cfg.listen_addr();

    tokio::select! {
        res = server::listener::run(&listen_addr, balancer) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
