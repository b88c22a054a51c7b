// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client for the tollgate auth service.
//!
//! [`coordinator::RequestCoordinator`] attaches the held access token to every
//! call and transparently refreshes it, with at most one refresh in flight.
//! [`api::ApiClient`] exposes the service routes on top of it.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod slot;

pub use api::ApiClient;
pub use coordinator::{ApiRequest, RequestCoordinator, SessionEvent};
pub use error::ClientError;
pub use slot::{CredentialSlot, FileSlot, MemorySlot};

static CRYPTO: std::sync::Once = std::sync::Once::new();

/// Install the ring crypto provider for rustls. Safe to call repeatedly.
pub fn ensure_crypto() {
    CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
