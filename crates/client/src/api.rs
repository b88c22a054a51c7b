// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;

use crate::coordinator::{ApiRequest, RequestCoordinator, SessionEvent, TokenPair};
use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthenticatedUser {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub iat: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub message: String,
    pub authenticated_user: AuthenticatedUser,
}

/// Typed access to the service routes. All calls go through the coordinator.
pub struct ApiClient {
    coordinator: Arc<RequestCoordinator>,
}

impl ApiClient {
    pub fn new(coordinator: Arc<RequestCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<RequestCoordinator> {
        &self.coordinator
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.coordinator.subscribe()
    }

    /// Whether an access token is held locally. Says nothing about validity.
    pub fn is_authenticated(&self) -> bool {
        self.coordinator.access_token().is_some()
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<User, ClientError> {
        let mut body = json!({ "email": email, "password": password });
        if let Some(name) = name {
            body["name"] = json!(name);
        }
        let resp: RegisterResponse =
            self.coordinator.send_json(&ApiRequest::post("/register", body)).await?;
        Ok(resp.user)
    }

    /// Log in and store both credentials.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let body = json!({ "email": email, "password": password });
        let resp: LoginResponse =
            self.coordinator.send_json(&ApiRequest::post("/login", body)).await?;
        self.coordinator.store_tokens(&TokenPair {
            access_token: resp.access_token.clone(),
            refresh_token: Some(resp.refresh_token.clone()),
        })?;
        tracing::info!(user = %resp.user.id, "logged in");
        Ok(resp)
    }

    pub async fn profile(&self) -> Result<ProfileResponse, ClientError> {
        self.coordinator.send_json(&ApiRequest::get("/profile")).await
    }

    /// Exchange the refresh token now, without waiting for a 401.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        self.coordinator.refresh_now().await.map(|_| ())
    }

    /// Revoke on the server when possible, then drop local credentials.
    ///
    /// The server call is best effort: local state is cleared even if it
    /// fails, and its error is only logged.
    pub async fn logout(&self, all: bool) -> Result<(), ClientError> {
        let mut body = json!({ "all": all });
        if let Some(refresh) = self.coordinator.refresh_token() {
            body["refreshToken"] = json!(refresh);
        }
        if let Err(e) = self.coordinator.send(&ApiRequest::post("/logout", body)).await {
            tracing::warn!(err = %e, "server logout failed, clearing local credentials anyway");
        }
        if self.coordinator.clear_credentials() {
            self.coordinator.emit(SessionEvent::Cleared);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
