// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the account and token endpoints.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::auth::token::{Claims, IssuedToken};
use crate::auth::TokenError;
use crate::error::{ApiError, Failure};
use crate::state::AppState;
use crate::store::{InsertError, NewUser, UserView};
use crate::transport::auth::authenticate;
use crate::validate::join_errors;

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub users: usize,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: UserView,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: UserView,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Revoke every refresh token of the bearer's account.
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub logged_out: bool,
}

/// Identity section of the profile response.
#[derive(Debug, Serialize)]
pub struct AuthenticatedUser {
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
    pub iat: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub message: String,
    pub authenticated_user: AuthenticatedUser,
}

// -- Helpers ------------------------------------------------------------------

fn bad_json(rejection: JsonRejection) -> Failure {
    ApiError::BadRequest.with(rejection.body_text())
}

async fn hash_password(s: &AppState, password: String) -> Result<String, Failure> {
    let hasher = s.hasher.clone();
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| Failure::internal("password hashing task failed", e))?
        .map_err(|e| Failure::internal("password hashing failed", e))
}

/// Verify off the async runtime. `stored` is `None` for unknown accounts.
async fn verify_password(
    s: &AppState,
    password: String,
    stored: Option<String>,
) -> Result<bool, Failure> {
    let hasher = s.hasher.clone();
    tokio::task::spawn_blocking(move || match stored {
        Some(hash) => hasher.verify(&password, &hash),
        None => hasher.verify_missing(&password),
    })
    .await
    .map_err(|e| Failure::internal("password verification task failed", e))
}

fn token_response(s: &AppState, access: IssuedToken, refresh_token: String) -> TokenResponse {
    TokenResponse {
        access_token: access.token,
        refresh_token,
        token_type: "Bearer",
        expires_in: s.issuer.ttl().as_secs(),
    }
}

// -- Handlers -----------------------------------------------------------------

/// `GET /health`
pub async fn health(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse { status: "running".to_owned(), users: s.users.len().await })
}

/// `POST /register`: create an account.
pub async fn register(
    State(s): State<Arc<AppState>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, Failure> {
    let Json(req) = body.map_err(bad_json)?;
    let valid = s
        .validator
        .registration(req.email.as_deref(), req.password.as_deref(), req.name.as_deref())
        .map_err(|errors| ApiError::Validation.with(join_errors(&errors)))?;

    // Cheap pre-check so duplicates skip the hash; insert re-checks under the lock.
    if s.users.find_by_email(&valid.email).await.is_some() {
        return Err(ApiError::Conflict.with("email already registered"));
    }

    let password_hash = hash_password(&s, valid.password).await?;
    let record = s
        .users
        .insert(NewUser { email: valid.email, name: valid.name, password_hash })
        .await
        .map_err(|e| match e {
            InsertError::Conflict => ApiError::Conflict.with("email already registered"),
            InsertError::Persist(e) => Failure::internal("failed to persist user", e),
        })?;

    tracing::info!(user = %record.id, "user registered");
    Ok((StatusCode::CREATED, Json(RegisterResponse { user: record.view() })))
}

/// `POST /login`: verify credentials and issue tokens.
pub async fn login(
    State(s): State<Arc<AppState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, Failure> {
    let Json(req) = body.map_err(bad_json)?;
    let valid = s
        .validator
        .login(req.email.as_deref(), req.password.as_deref())
        .map_err(|errors| ApiError::Validation.with(join_errors(&errors)))?;

    let user = s.users.find_by_email(&valid.email).await;
    let stored = user.as_ref().map(|u| u.password_hash.clone());
    let verified = verify_password(&s, valid.password, stored).await?;
    let Some(user) = user.filter(|_| verified) else {
        tracing::debug!("login rejected");
        return Err(ApiError::Unauthorized.with("invalid email or password"));
    };

    let access = s.issuer.mint(&user).map_err(|e| Failure::internal("failed to sign token", e))?;
    let refresh_token = s.refresh.issue(&user.id).await;
    tracing::info!(user = %user.id, "user logged in");

    let tokens = token_response(&s, access, refresh_token);
    Ok(Json(LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: tokens.token_type,
        expires_in: tokens.expires_in,
        user: user.view(),
    }))
}

/// `POST /refresh-token`: exchange a refresh token for a new token pair.
pub async fn refresh_token(
    State(s): State<Arc<AppState>>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<impl IntoResponse, Failure> {
    let Json(req) = body.map_err(bad_json)?;
    let Some(artifact) = req.refresh_token.filter(|t| !t.is_empty()) else {
        return Err(ApiError::Unauthorized.with("refresh token required"));
    };

    let rotated = s.refresh.rotate(&artifact).await.map_err(|e| match e {
        TokenError::Expired => ApiError::Unauthorized.with("refresh token expired"),
        TokenError::Invalid => ApiError::Unauthorized.with("invalid refresh token"),
    })?;

    let Some(user) = s.users.get(&rotated.user_id).await else {
        s.refresh.revoke(&rotated.artifact).await;
        tracing::warn!(user = %rotated.user_id, "refresh for unknown account");
        return Err(ApiError::Unauthorized.with("account no longer exists"));
    };

    let access = s.issuer.mint(&user).map_err(|e| Failure::internal("failed to sign token", e))?;
    tracing::debug!(user = %user.id, "access token refreshed");
    Ok(Json(token_response(&s, access, rotated.artifact)))
}

/// `POST /logout`: revoke refresh state. Always succeeds.
///
/// The body is optional and parsed leniently: a client clearing local state
/// must never be blocked by a malformed request.
pub async fn logout(
    State(s): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let req: LogoutRequest = if body.is_empty() {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body).unwrap_or_default()
    };

    let owner = match req.refresh_token {
        Some(ref artifact) => s.refresh.take(artifact).await,
        None => None,
    };
    if req.all {
        // The refresh token names the account even after the access token expired.
        let user = owner.or_else(|| authenticate(&headers, &s.issuer).ok().map(|c| c.sub));
        match user {
            Some(user) => {
                let revoked = s.refresh.revoke_all(&user).await;
                tracing::info!(user = %user, revoked, "revoked all sessions");
            }
            None => tracing::debug!("logout of all sessions without a known account"),
        }
    }
    Json(LogoutResponse { logged_out: true })
}

/// `GET /profile`: protected; echoes the authenticated identity.
pub async fn profile(Extension(claims): Extension<Claims>) -> impl IntoResponse {
    Json(ProfileResponse {
        message: "Access granted to protected profile".to_owned(),
        authenticated_user: AuthenticatedUser {
            sub: claims.sub,
            email: claims.email,
            name: claims.name,
            iat: claims.iat,
        },
    })
}
