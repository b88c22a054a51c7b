// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::token::{Claims, TokenIssuer};
use crate::auth::TokenError;
use crate::error::{ApiError, Failure};
use crate::state::AppState;

/// Extract the bearer credential from an `Authorization` header.
///
/// The scheme is matched case-insensitively; an empty token counts as absent.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Verify the bearer credential in `headers` and return its claims.
pub fn authenticate(headers: &HeaderMap, issuer: &TokenIssuer) -> Result<Claims, Failure> {
    let token = bearer_token(headers).ok_or_else(|| ApiError::Unauthorized.with("missing bearer token"))?;
    issuer.verify(token).map_err(|e| match e {
        TokenError::Expired => ApiError::Unauthorized.with("access token expired"),
        TokenError::Invalid => ApiError::Unauthorized.with("invalid access token"),
    })
}

/// Axum middleware that requires a valid access token.
///
/// On success the decoded [`Claims`] are inserted into request extensions.
pub async fn auth_layer(
    State(s): State<Arc<AppState>>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    match authenticate(req.headers(), &s.issuer) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(failure) => {
            tracing::debug!(path = %req.uri().path(), reason = %failure.message, "rejected request");
            failure.into_response()
        }
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
