// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential verification and token lifecycle.
//!
//! - [`password`]: argon2id hashing and verification.
//! - [`token`]: stateless signed access tokens.
//! - [`refresh`]: opaque refresh artifacts with rotation and revocation.

pub mod password;
pub mod refresh;
pub mod token;

/// Why a token or refresh artifact was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
}
