// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::Deserialize;

/// Errors surfaced to callers of the client library.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Input rejected by the server; message lists every violation.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    /// Bad credentials, or a request still unauthorized after a refresh.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The refresh exchange failed. Local credentials have been cleared.
    #[error("session expired, please log in again")]
    SessionExpired,
    /// The refresh this request was waiting on was cancelled.
    #[error("token refresh was abandoned before completing")]
    RefreshAbandoned,
    #[error("server returned {status}: {message}")]
    Http { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("credential storage failed: {0}")]
    Storage(String),
}

impl ClientError {
    /// Whether the caller must authenticate again before retrying.
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::Unauthorized(_))
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    message: String,
}

/// Map a non-success status and body into a [`ClientError`].
pub fn classify(status: u16, body: &[u8]) -> ClientError {
    let (code, message) = match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(env) => (env.error.code, env.error.message),
        Err(_) => (String::new(), String::from_utf8_lossy(body).trim().to_owned()),
    };
    match status {
        401 => ClientError::Unauthorized(message),
        409 => ClientError::Conflict(message),
        400 if code == "VALIDATION" => ClientError::Validation(message),
        _ => ClientError::Http { status, message },
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
