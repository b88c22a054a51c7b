// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tollgate: account registration, login and token refresh service.

pub mod auth;
pub mod config;
pub mod error;
pub mod state;
pub mod store;
pub mod transport;
pub mod validate;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::auth::refresh::spawn_purger;
use crate::config::ServerConfig;
use crate::state::AppState;
use crate::transport::build_router;

const REFRESH_PURGE_INTERVAL: Duration = Duration::from_secs(300);

/// Bind the configured address and serve until ctrl-c.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
                shutdown.cancel();
            }
        });
    }

    serve(listener, config, shutdown).await
}

/// Serve on an already-bound listener until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    config: ServerConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(config, shutdown.clone())?);
    spawn_purger(Arc::clone(&state.refresh), REFRESH_PURGE_INTERVAL, shutdown.clone());

    if state.config.data_file.is_some() {
        tracing::info!("tollgate listening on {} (file-backed users)", listener.local_addr()?);
    } else {
        tracing::info!("tollgate listening on {}", listener.local_addr()?);
    }
    let router = build_router(state);
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;
    Ok(())
}
