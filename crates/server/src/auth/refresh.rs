// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refresh artifacts: opaque random strings exchanged for new access tokens.
//!
//! Only the SHA-256 digest of an artifact is kept. Every exchange rotates the
//! artifact, so a leaked one stops working once its owner refreshes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::auth::TokenError;
use crate::state::epoch_secs;

struct RefreshRecord {
    user_id: String,
    expires_at: u64,
}

/// Outcome of a successful exchange.
#[derive(Debug, Clone)]
pub struct Rotated {
    pub user_id: String,
    pub artifact: String,
}

pub struct RefreshStore {
    records: RwLock<HashMap<String, RefreshRecord>>,
    ttl: Duration,
}

/// Generate a new artifact: 32 random bytes, base64url without padding.
pub fn generate_artifact() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn digest(artifact: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(artifact.as_bytes()))
}

impl RefreshStore {
    pub fn new(ttl: Duration) -> Self {
        Self { records: RwLock::new(HashMap::new()), ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a new artifact for `user_id`.
    pub async fn issue(&self, user_id: &str) -> String {
        let artifact = generate_artifact();
        let record = RefreshRecord {
            user_id: user_id.to_owned(),
            expires_at: epoch_secs().saturating_add(self.ttl.as_secs()),
        };
        self.records.write().await.insert(digest(&artifact), record);
        artifact
    }

    /// Consume `artifact` and issue its replacement.
    ///
    /// The old artifact is removed whether or not it was still valid.
    pub async fn rotate(&self, artifact: &str) -> Result<Rotated, TokenError> {
        let mut records = self.records.write().await;
        let record = records.remove(&digest(artifact)).ok_or(TokenError::Invalid)?;
        let now = epoch_secs();
        if record.expires_at <= now {
            return Err(TokenError::Expired);
        }

        let next = generate_artifact();
        records.insert(
            digest(&next),
            RefreshRecord {
                user_id: record.user_id.clone(),
                expires_at: now.saturating_add(self.ttl.as_secs()),
            },
        );
        Ok(Rotated { user_id: record.user_id, artifact: next })
    }

    /// Revoke a single artifact. Returns whether it was known.
    pub async fn revoke(&self, artifact: &str) -> bool {
        self.records.write().await.remove(&digest(artifact)).is_some()
    }

    /// Revoke a single artifact and return the account it belonged to.
    ///
    /// Expired artifacts still name their owner.
    pub async fn take(&self, artifact: &str) -> Option<String> {
        self.records.write().await.remove(&digest(artifact)).map(|r| r.user_id)
    }

    /// Revoke every artifact belonging to `user_id`.
    pub async fn revoke_all(&self, user_id: &str) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.user_id != user_id);
        before - records.len()
    }

    /// Drop expired records.
    pub async fn purge_expired(&self) -> usize {
        let now = epoch_secs();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.expires_at > now);
        before - records.len()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

/// Spawn a background task that periodically purges expired artifacts.
pub fn spawn_purger(store: Arc<RefreshStore>, interval: Duration, shutdown: CancellationToken) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.cancelled() => break,
            }
            let purged = store.purge_expired().await;
            if purged > 0 {
                tracing::debug!(purged, "purged expired refresh tokens");
            }
        }
    });
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
