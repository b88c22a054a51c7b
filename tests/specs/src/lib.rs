// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end tests.
//!
//! Runs a real tollgate server on a loopback port inside the test process and
//! drives it through the client library.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use tollgate::config::ServerConfig;
use tollgate_client::{ApiClient, CredentialSlot, MemorySlot, RequestCoordinator};

pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Server settings for tests: cheap hashing, short-lived tokens.
pub fn test_config(access_ttl_secs: u64) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "end-to-end-secret-0123456789".into(),
        access_ttl_secs,
        refresh_ttl_secs: 3600,
        data_file: None,
        hash_memory_kib: 1024,
        hash_iterations: 1,
        log_format: "text".into(),
        log_level: "warn".into(),
    }
}

/// A running server that shuts down on drop.
pub struct TollgateServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
}

impl TollgateServer {
    pub async fn start(config: ServerConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tollgate::serve(listener, config, token).await {
                eprintln!("tollgate server exited: {e:#}");
            }
        });
        let server = Self { addr, shutdown };
        server.wait_healthy(TIMEOUT).await?;
        Ok(server)
    }

    /// Start with a data file so users survive restarts.
    pub async fn start_with_data(access_ttl_secs: u64, data_file: PathBuf) -> anyhow::Result<Self> {
        let mut config = test_config(access_ttl_secs);
        config.data_file = Some(data_file);
        Self::start(config).await
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// A client with its own in-memory credential slot.
    pub fn client(&self) -> anyhow::Result<(ApiClient, Arc<MemorySlot>)> {
        let slot = Arc::new(MemorySlot::new());
        let shared: Arc<dyn CredentialSlot> = Arc::clone(&slot) as Arc<dyn CredentialSlot>;
        let coordinator = RequestCoordinator::new(&self.base_url(), shared, TIMEOUT)?;
        Ok((ApiClient::new(Arc::new(coordinator)), slot))
    }

    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        tollgate_client::ensure_crypto();
        let url = format!("{}/health", self.base_url());
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("server did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = reqwest::get(&url).await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for TollgateServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
