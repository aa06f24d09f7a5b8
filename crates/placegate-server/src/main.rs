use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use placegate_db::Store;
use placegate_gateway::upstream::TlsUpstream;
use placegate_gateway::{Gateway, GatewayConfig};

fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "placegate=debug".into()),
        )
        .init();

    // Config
    let defaults = GatewayConfig::default();
    let config = GatewayConfig {
        port: std::env::var("PLACEGATE_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()?,
        upstream_host: std::env::var("PLACEGATE_UPSTREAM_HOST")
            .unwrap_or(defaults.upstream_host),
        upstream_port: std::env::var("PLACEGATE_UPSTREAM_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.upstream_port),
        allow_anonymous: std::env::var("PLACEGATE_ALLOW_ANON")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.allow_anonymous),
        workers: std::env::var("PLACEGATE_WORKERS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.workers),
        query_limit: std::env::var("PLACEGATE_QUERY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.query_limit),
    };

    // Init store; an empty path runs the gateway as a pass-through proxy
    let db_path = std::env::var("PLACEGATE_DB_PATH").unwrap_or_else(|_| "placegate.db".into());
    let store = if db_path.is_empty() {
        info!("No database path configured, searches will not be recorded");
        None
    } else {
        Some(Arc::new(Store::open(&PathBuf::from(&db_path))?))
    };

    let upstream = Arc::new(TlsUpstream::new(
        config.upstream_host.clone(),
        config.upstream_port,
    ));

    let handle = Gateway::new(config, store, upstream).start()?;
    handle.join();

    Ok(())
}
