//! Semantic MDM HTTP service.
//!
//! Loads every configured domain's term file, embeds the terms once and then
//! answers resolution queries over HTTP until interrupted.
//!
//! # Environment Variables
//!
//! - `SEMANTIC_MDM_LOG`: tracing filter (default `info`)
//! - `SEMANTIC_MDM_CONFIG`: path to the JSON config file
//! - `SEMANTIC_MDM_DATA_DIR`: directory holding the term files
//! - `SEMANTIC_MDM_SERVICE_HOST`: bind address (default `127.0.0.1`)
//! - `SEMANTIC_MDM_SERVICE_PORT`: bind port (default `3210`)

#[cfg(feature = "http-server")]
use std::net::SocketAddr;

#[cfg(feature = "http-server")]
use anyhow::{Context, Result};
#[cfg(feature = "http-server")]
use tracing::info;

#[cfg(feature = "http-server")]
const DEFAULT_HOST: &str = "127.0.0.1";
#[cfg(feature = "http-server")]
const DEFAULT_PORT: u16 = 3210;

#[cfg(feature = "http-server")]
fn bind_addr() -> Result<SocketAddr> {
    let host =
        std::env::var("SEMANTIC_MDM_SERVICE_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port = std::env::var("SEMANTIC_MDM_SERVICE_PORT")
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);

    format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid bind address {host}:{port}"))
}

#[cfg(feature = "http-server")]
async fn run_service() -> Result<()> {
    semantic_mdm::init_tracing();

    info!(
        target: "semantic_mdm::service",
        version = env!("CARGO_PKG_VERSION"),
        "starting semantic-mdm service"
    );

    let handles = tokio::task::spawn_blocking(semantic_mdm::build_environment)
        .await
        .context("bootstrap task panicked")??;

    info!(
        target: "semantic_mdm::service",
        data_dir = %handles.data_dir.display(),
        config = %handles.config.path().display(),
        "environment ready"
    );

    let app = semantic_mdm::interfaces::http::router(handles.service);
    let addr = bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(target: "semantic_mdm::service", "listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!(target: "semantic_mdm::service", "shutdown signal received");
        })
        .await
        .context("HTTP server failed")?;

    Ok(())
}

#[cfg(feature = "http-server")]
#[tokio::main]
async fn main() {
    if let Err(err) = run_service().await {
        eprintln!("[semantic-mdm] service failed: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(not(feature = "http-server"))]
fn main() {
    eprintln!("[semantic-mdm] Build with `--features http-server` to enable the HTTP service.");
    std::process::exit(1);
}
