// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for the account API.

pub mod auth;
pub mod http;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the axum `Router` with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/profile", get(http::profile))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer));

    Router::new()
        // Health (no auth)
        .route("/health", get(http::health))
        // Account + token lifecycle
        .route("/register", post(http::register))
        .route("/login", post(http::login))
        .route("/refresh-token", post(http::refresh_token))
        .route("/refresh", post(http::refresh_token))
        .route("/logout", post(http::logout))
        // Bearer-protected
        .merge(protected)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
