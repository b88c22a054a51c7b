// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::auth::password::PasswordHasher;
use crate::auth::refresh::RefreshStore;
use crate::auth::token::TokenIssuer;
use crate::config::ServerConfig;
use crate::store::UserStore;
use crate::validate::Validator;

/// Shared service state.
pub struct AppState {
    pub config: ServerConfig,
    pub users: UserStore,
    pub issuer: TokenIssuer,
    pub refresh: Arc<RefreshStore>,
    pub hasher: PasswordHasher,
    pub validator: Validator,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: ServerConfig, shutdown: CancellationToken) -> anyhow::Result<Self> {
        let users = match config.data_file {
            Some(ref path) => UserStore::open(path.clone())?,
            None => UserStore::in_memory(),
        };
        Self::with_store(config, users, shutdown)
    }

    /// Build state around an already-open user store.
    pub fn with_store(
        config: ServerConfig,
        users: UserStore,
        shutdown: CancellationToken,
    ) -> anyhow::Result<Self> {
        let issuer = TokenIssuer::new(config.jwt_secret.as_bytes(), config.access_ttl());
        let refresh = Arc::new(RefreshStore::new(config.refresh_ttl()));
        let hasher = PasswordHasher::new(config.hash_memory_kib, config.hash_iterations)?;
        Ok(Self {
            config,
            users,
            issuer,
            refresh,
            hasher,
            validator: Validator::new()?,
            shutdown,
        })
    }
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Return current epoch seconds.
pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
