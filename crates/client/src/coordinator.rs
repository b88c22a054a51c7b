// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request coordination: bearer attachment plus single-flight refresh-and-retry.
//!
//! Every request goes out with the held access token. When a non-auth request
//! comes back 401, exactly one caller becomes the refresh leader and performs
//! the exchange; every other caller that hits a 401 meanwhile parks a oneshot
//! in the pending queue. When the exchange settles the queue is drained in one
//! step: each waiter replays its request once with the new token, or all of
//! them fail together with [`ClientError::SessionExpired`].
//!
//! A replayed request that gets a second 401 fails with
//! [`ClientError::Unauthorized`]; it never starts another refresh cycle.
//!
//! The refresh state is per coordinator. Two processes sharing one credential
//! file do not coordinate and may both refresh.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};

use crate::error::{classify, ClientError};
use crate::slot::{CredentialSlot, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

/// Paths that take part in authentication itself. A 401 from one of these
/// means the credentials are wrong, never that the access token went stale.
const AUTH_PATHS: &[&str] = &["/login", "/register", "/refresh-token", "/refresh"];

pub const DEFAULT_REFRESH_PATH: &str = "/refresh-token";

/// Session lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A refresh exchange stored a new access token.
    Refreshed,
    /// A refresh exchange failed; credentials were cleared.
    Expired,
    /// Credentials were cleared (logout or rejected login).
    Cleared,
}

/// An outgoing API call. Kept whole so it can be replayed after a refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: Method::GET, path: path.into(), body: None }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self { method: Method::POST, path: path.into(), body: Some(body) }
    }
}

/// Token pair returned by login and refresh.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Why queued requests were released without a token.
#[derive(Debug, Clone, Copy)]
enum RefreshFailure {
    Exhausted,
    Abandoned,
}

impl From<RefreshFailure> for ClientError {
    fn from(f: RefreshFailure) -> Self {
        match f {
            RefreshFailure::Exhausted => ClientError::SessionExpired,
            RefreshFailure::Abandoned => ClientError::RefreshAbandoned,
        }
    }
}

type Waiter = oneshot::Sender<Result<String, RefreshFailure>>;

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: Vec<Waiter>,
}

/// What a caller that saw a 401 should do next.
enum Role {
    Leader,
    Follower(oneshot::Receiver<Result<String, RefreshFailure>>),
    /// Someone already refreshed since this request was sent.
    Replay(String),
}

pub struct RequestCoordinator {
    base_url: String,
    refresh_path: String,
    http: reqwest::Client,
    slot: Arc<dyn CredentialSlot>,
    refresh: Mutex<RefreshState>,
    events: broadcast::Sender<SessionEvent>,
}

/// Releases the queue if the leader's future is dropped before settling.
struct LeaderGuard<'a> {
    coordinator: &'a RequestCoordinator,
    settled: bool,
}

impl LeaderGuard<'_> {
    fn settle(mut self, outcome: Result<String, RefreshFailure>) {
        self.settled = true;
        self.coordinator.settle(outcome);
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!("refresh leader dropped before settling");
            self.coordinator.settle(Err(RefreshFailure::Abandoned));
        }
    }
}

impl RequestCoordinator {
    pub fn new(
        base_url: &str,
        slot: Arc<dyn CredentialSlot>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        crate::ensure_crypto();
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let (events, _) = broadcast::channel(16);
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            refresh_path: DEFAULT_REFRESH_PATH.to_owned(),
            http,
            slot,
            refresh: Mutex::new(RefreshState::default()),
            events,
        })
    }

    /// Use a different refresh endpoint (e.g. `/refresh`).
    pub fn with_refresh_path(mut self, path: &str) -> Self {
        self.refresh_path = path.to_owned();
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn access_token(&self) -> Option<String> {
        self.slot.load(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.slot.load(REFRESH_TOKEN_KEY)
    }

    /// Whether a refresh exchange is currently in flight.
    pub fn refresh_in_flight(&self) -> bool {
        self.refresh.lock().in_flight
    }

    #[cfg(test)]
    fn queued(&self) -> usize {
        self.refresh.lock().waiters.len()
    }

    /// Whether `path` belongs to the authentication flow itself.
    pub fn is_auth_endpoint(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        path == self.refresh_path || AUTH_PATHS.contains(&path)
    }

    /// Store a token pair. A pair without a refresh token keeps the old one.
    pub fn store_tokens(&self, tokens: &TokenPair) -> Result<(), ClientError> {
        self.slot
            .store(ACCESS_TOKEN_KEY, &tokens.access_token)
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        if let Some(ref refresh) = tokens.refresh_token {
            self.slot
                .store(REFRESH_TOKEN_KEY, refresh)
                .map_err(|e| ClientError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    /// Drop held credentials. Returns whether anything was held.
    pub fn clear_credentials(&self) -> bool {
        let held = self.access_token().is_some() || self.refresh_token().is_some();
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.slot.remove(key) {
                tracing::warn!(key, err = %e, "failed to clear credential");
            }
        }
        held
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn dispatch(
        &self,
        req: &ApiRequest,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ClientError> {
        let mut builder = self.http.request(req.method.clone(), self.url(&req.path));
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = req.body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }

    /// Send `req`, refreshing and replaying once on a stale access token.
    pub async fn send(&self, req: &ApiRequest) -> Result<Value, ClientError> {
        let held = self.access_token();
        let resp = self.dispatch(req, held.as_deref()).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return decode(resp).await;
        }

        if self.is_auth_endpoint(&req.path) {
            if self.clear_credentials() {
                self.emit(SessionEvent::Cleared);
            }
            return decode(resp).await;
        }

        tracing::debug!(path = %req.path, "unauthorized, coordinating refresh");
        let token = self.recover(held.as_deref()).await?;

        // Retried: a second 401 propagates as-is.
        let resp = self.dispatch(req, Some(&token)).await?;
        decode(resp).await
    }

    /// Like [`send`](Self::send), decoding the body into `T`.
    pub async fn send_json<T: DeserializeOwned>(&self, req: &ApiRequest) -> Result<T, ClientError> {
        let value = self.send(req).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Force a refresh exchange, joining one already in flight.
    pub async fn refresh_now(&self) -> Result<String, ClientError> {
        self.recover(None).await
    }

    /// Obtain a usable access token after `rejected` drew a 401.
    async fn recover(&self, rejected: Option<&str>) -> Result<String, ClientError> {
        let role = {
            let mut state = self.refresh.lock();
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Role::Follower(rx)
            } else {
                match (rejected, self.access_token()) {
                    (Some(old), Some(current)) if old != current => Role::Replay(current),
                    _ => {
                        state.in_flight = true;
                        Role::Leader
                    }
                }
            }
        };

        match role {
            Role::Replay(token) => Ok(token),
            Role::Follower(rx) => match rx.await {
                Ok(outcome) => outcome.map_err(ClientError::from),
                Err(_) => Err(ClientError::RefreshAbandoned),
            },
            Role::Leader => {
                let guard = LeaderGuard { coordinator: self, settled: false };
                match self.exchange().await {
                    Ok(token) => {
                        guard.settle(Ok(token.clone()));
                        self.emit(SessionEvent::Refreshed);
                        Ok(token)
                    }
                    Err(e) => {
                        tracing::warn!(err = %e, "token refresh failed, session expired");
                        let held = self.clear_credentials();
                        guard.settle(Err(RefreshFailure::Exhausted));
                        if held {
                            self.emit(SessionEvent::Expired);
                        }
                        Err(ClientError::SessionExpired)
                    }
                }
            }
        }
    }

    /// Trade the held refresh token for a new pair and store it.
    async fn exchange(&self) -> Result<String, ClientError> {
        let Some(refresh) = self.refresh_token() else {
            return Err(ClientError::Unauthorized("no refresh token held".to_owned()));
        };
        let resp = self
            .http
            .post(self.url(&self.refresh_path))
            .json(&serde_json::json!({ "refreshToken": refresh }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.bytes().await.unwrap_or_default();
            return Err(classify(status.as_u16(), &body));
        }
        let tokens: TokenPair = resp.json().await?;
        self.store_tokens(&tokens)?;
        tracing::debug!("access token refreshed");
        Ok(tokens.access_token)
    }

    /// Clear the in-flight flag and release every queued waiter at once.
    fn settle(&self, outcome: Result<String, RefreshFailure>) {
        let waiters = {
            let mut state = self.refresh.lock();
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };
        if !waiters.is_empty() {
            tracing::debug!(queued = waiters.len(), ok = outcome.is_ok(), "releasing queued requests");
        }
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

async fn decode(resp: reqwest::Response) -> Result<Value, ClientError> {
    let status = resp.status();
    let body = resp.bytes().await?;
    if !status.is_success() {
        return Err(classify(status.as_u16(), &body));
    }
    if body.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&body)?)
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
