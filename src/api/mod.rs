pub mod routes;

use crate::config::Config;
use crate::service::Planner;
use anyhow::{Context, Result};
use axum::Router;
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub async fn run_server(
    config: Arc<Config>,
    planner: Planner,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let port = config.api_port;
    let state = routes::ApiState { planner, config };
    let app: Router = routes::router(state);

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server: {addr}"))?;

    info!(address = %addr, "TaskPulse API server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server failed")?;

    info!("TaskPulse API server stopped");
    Ok(())
}
