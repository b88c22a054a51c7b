// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the account HTTP API.
//!
//! Uses `axum_test::TestServer`; no real TCP needed.

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use tollgate::auth::token::TokenIssuer;
use tollgate::config::ServerConfig;
use tollgate::state::AppState;
use tollgate::transport::build_router;

const SECRET: &str = "integration-secret-0123456789";

fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: SECRET.into(),
        access_ttl_secs: 3600,
        refresh_ttl_secs: 7200,
        data_file: None,
        hash_memory_kib: 1024,
        hash_iterations: 1,
        log_format: "text".into(),
        log_level: "debug".into(),
    }
}

fn test_state(config: ServerConfig) -> anyhow::Result<Arc<AppState>> {
    Ok(Arc::new(AppState::new(config, CancellationToken::new())?))
}

fn test_server() -> anyhow::Result<(TestServer, Arc<AppState>)> {
    let state = test_state(test_config())?;
    let server = TestServer::new(build_router(Arc::clone(&state)))?;
    Ok((server, state))
}

async fn register(server: &TestServer, email: &str, password: &str) -> axum_test::TestResponse {
    server.post("/register").json(&json!({ "email": email, "password": password })).await
}

async fn login(server: &TestServer, email: &str, password: &str) -> axum_test::TestResponse {
    server.post("/login").json(&json!({ "email": email, "password": password })).await
}

fn str_field<'a>(body: &'a Value, key: &str) -> anyhow::Result<&'a str> {
    body[key].as_str().ok_or_else(|| anyhow::anyhow!("missing {key} in {body}"))
}

// -- Scenario ---------------------------------------------------------------

#[tokio::test]
async fn register_login_profile_scenario() -> anyhow::Result<()> {
    let (server, _) = test_server()?;

    let resp = register(&server, "a@x.com", "password1").await;
    resp.assert_status(StatusCode::CREATED);
    let body: Value = resp.json();
    assert_eq!(body["user"]["email"], "a@x.com");

    let resp = register(&server, "a@x.com", "password1").await;
    resp.assert_status(StatusCode::CONFLICT);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "CONFLICT");

    let resp = login(&server, "a@x.com", "password1").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    let token = str_field(&body, "accessToken")?.to_owned();
    assert_eq!(body["tokenType"], "Bearer");
    assert_eq!(body["expiresIn"], 3600);

    let resp = server.get("/profile").authorization_bearer(&token).await;
    resp.assert_status_ok();
    let profile: Value = resp.json();
    assert_eq!(profile["authenticatedUser"]["email"], "a@x.com");
    assert_eq!(profile["authenticatedUser"]["sub"], body["user"]["id"]);
    assert!(profile["authenticatedUser"]["iat"].is_u64());
    assert!(profile["message"].is_string());

    server.get("/profile").await.assert_status(StatusCode::UNAUTHORIZED);
    Ok(())
}

// -- Registration -----------------------------------------------------------

#[tokio::test]
async fn register_response_and_store_never_hold_plaintext() -> anyhow::Result<()> {
    let (server, state) = test_server()?;
    let resp = server
        .post("/register")
        .json(&json!({ "email": "Ada@X.com", "password": "s3cret-pass", "name": "Ada" }))
        .await;
    resp.assert_status(StatusCode::CREATED);

    let text = resp.text();
    assert!(!text.contains("s3cret-pass"));
    assert!(!text.contains("passwordHash"));

    let record = state.users.find_by_email("ada@x.com").await;
    let record = record.ok_or_else(|| anyhow::anyhow!("user not stored"))?;
    assert_eq!(record.name.as_deref(), Some("Ada"));
    assert!(!record.password_hash.contains("s3cret-pass"));
    assert!(state.hasher.verify("s3cret-pass", &record.password_hash));
    Ok(())
}

#[tokio::test]
async fn blank_name_registers_without_name() -> anyhow::Result<()> {
    let (server, state) = test_server()?;
    server
        .post("/register")
        .json(&json!({ "email": "a@x.com", "password": "password1", "name": "  " }))
        .await
        .assert_status(StatusCode::CREATED);
    let record = state.users.find_by_email("a@x.com").await;
    let record = record.ok_or_else(|| anyhow::anyhow!("user not stored"))?;
    assert_eq!(record.name, None);
    Ok(())
}

#[tokio::test]
async fn duplicate_check_ignores_case() -> anyhow::Result<()> {
    let (server, _) = test_server()?;
    register(&server, "a@x.com", "password1").await.assert_status(StatusCode::CREATED);
    register(&server, "A@X.COM", "different1").await.assert_status(StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn validation_errors_are_joined() -> anyhow::Result<()> {
    let (server, _) = test_server()?;
    let resp = server.post("/register").json(&json!({ "email": "nope", "password": "abc" })).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "VALIDATION");
    assert_eq!(
        body["error"]["message"],
        "email must be a valid email address; password must be at least 6 characters"
    );
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_bad_request() -> anyhow::Result<()> {
    let (server, _) = test_server()?;
    let resp = server
        .post("/register")
        .content_type("application/json")
        .bytes("{not json".into())
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    Ok(())
}

// -- Login ------------------------------------------------------------------

#[tokio::test]
async fn wrong_password_always_unauthorized() -> anyhow::Result<()> {
    let (server, _) = test_server()?;
    register(&server, "a@x.com", "password1").await.assert_status(StatusCode::CREATED);

    for _ in 0..3 {
        let resp = login(&server, "a@x.com", "password2").await;
        resp.assert_status(StatusCode::UNAUTHORIZED);
    }
    login(&server, "nobody@x.com", "password1").await.assert_status(StatusCode::UNAUTHORIZED);
    login(&server, "a@x.com", "password1").await.assert_status_ok();
    Ok(())
}

#[tokio::test]
async fn login_token_subject_matches_registration() -> anyhow::Result<()> {
    let (server, _) = test_server()?;
    let registered: Value = register(&server, "a@x.com", "password1").await.json();
    let body: Value = login(&server, "a@x.com", "password1").await.json();

    let issuer = TokenIssuer::new(SECRET.as_bytes(), std::time::Duration::from_secs(3600));
    let claims = issuer.verify(str_field(&body, "accessToken")?)?;
    assert_eq!(claims.sub, str_field(&registered["user"], "id")?);
    assert_eq!(claims.email, "a@x.com");
    Ok(())
}

#[tokio::test]
async fn missing_login_fields_are_validation_errors() -> anyhow::Result<()> {
    let (server, _) = test_server()?;
    let resp = server.post("/login").json(&json!({})).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"]["message"], "email is required; password is required");
    Ok(())
}

// -- Profile ----------------------------------------------------------------

#[tokio::test]
async fn profile_rejects_bad_tokens() -> anyhow::Result<()> {
    let (server, _) = test_server()?;
    server.get("/profile").authorization_bearer("garbage").await.assert_status(StatusCode::UNAUTHORIZED);

    let foreign = TokenIssuer::new(b"another-secret-entirely", std::time::Duration::from_secs(60));
    let record = tollgate::store::UserRecord {
        id: "x".into(),
        email: "x@x.com".into(),
        name: None,
        password_hash: String::new(),
        created_at_ms: 0,
        updated_at_ms: 0,
    };
    let token = foreign.mint(&record)?.token;
    server.get("/profile").authorization_bearer(&token).await.assert_status(StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn expired_access_token_rejected() -> anyhow::Result<()> {
    let (server, state) = test_server()?;
    register(&server, "a@x.com", "password1").await.assert_status(StatusCode::CREATED);
    let user = state.users.find_by_email("a@x.com").await;
    let user = user.ok_or_else(|| anyhow::anyhow!("missing user"))?;

    let stale = state.issuer.mint_at(&user, tollgate::state::epoch_secs() - 7200)?;
    let resp = server.get("/profile").authorization_bearer(&stale.token).await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = resp.json();
    assert_eq!(body["error"]["message"], "access token expired");
    Ok(())
}

// -- Refresh + logout -------------------------------------------------------

#[tokio::test]
async fn refresh_rotates_the_refresh_token() -> anyhow::Result<()> {
    let (server, _) = test_server()?;
    register(&server, "a@x.com", "password1").await.assert_status(StatusCode::CREATED);
    let body: Value = login(&server, "a@x.com", "password1").await.json();
    let first = str_field(&body, "refreshToken")?.to_owned();

    let resp = server.post("/refresh-token").json(&json!({ "refreshToken": first })).await;
    resp.assert_status_ok();
    let rotated: Value = resp.json();
    let access = str_field(&rotated, "accessToken")?;
    let second = str_field(&rotated, "refreshToken")?;
    assert_ne!(second, first);

    server.get("/profile").authorization_bearer(access).await.assert_status_ok();

    // The consumed token no longer works; the alias route accepts the new one.
    server
        .post("/refresh-token")
        .json(&json!({ "refreshToken": first }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server.post("/refresh").json(&json!({ "refreshToken": second })).await.assert_status_ok();
    Ok(())
}

#[tokio::test]
async fn refresh_without_token_unauthorized() -> anyhow::Result<()> {
    let (server, _) = test_server()?;
    server.post("/refresh-token").json(&json!({})).await.assert_status(StatusCode::UNAUTHORIZED);
    server
        .post("/refresh-token")
        .json(&json!({ "refreshToken": "made-up" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn logout_revokes_refresh_token() -> anyhow::Result<()> {
    let (server, state) = test_server()?;
    register(&server, "a@x.com", "password1").await.assert_status(StatusCode::CREATED);
    let body: Value = login(&server, "a@x.com", "password1").await.json();
    let refresh = str_field(&body, "refreshToken")?;

    let resp = server.post("/logout").json(&json!({ "refreshToken": refresh })).await;
    resp.assert_status_ok();
    let out: Value = resp.json();
    assert_eq!(out["loggedOut"], true);
    assert_eq!(state.refresh.len().await, 0);

    server
        .post("/refresh-token")
        .json(&json!({ "refreshToken": refresh }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn logout_all_revokes_every_session() -> anyhow::Result<()> {
    let (server, state) = test_server()?;
    register(&server, "a@x.com", "password1").await.assert_status(StatusCode::CREATED);
    let _first: Value = login(&server, "a@x.com", "password1").await.json();
    let second: Value = login(&server, "a@x.com", "password1").await.json();
    assert_eq!(state.refresh.len().await, 2);

    let access = str_field(&second, "accessToken")?;
    server
        .post("/logout")
        .authorization_bearer(access)
        .json(&json!({ "all": true }))
        .await
        .assert_status_ok();
    assert_eq!(state.refresh.len().await, 0);
    Ok(())
}

#[tokio::test]
async fn logout_all_uses_refresh_token_owner_without_bearer() -> anyhow::Result<()> {
    let (server, state) = test_server()?;
    register(&server, "a@x.com", "password1").await.assert_status(StatusCode::CREATED);
    register(&server, "b@x.com", "password1").await.assert_status(StatusCode::CREATED);
    let mine: Value = login(&server, "a@x.com", "password1").await.json();
    let other_device: Value = login(&server, "a@x.com", "password1").await.json();
    let _someone_else: Value = login(&server, "b@x.com", "password1").await.json();
    assert_eq!(state.refresh.len().await, 3);

    // A stale bearer must not stop the revocation.
    server
        .post("/logout")
        .authorization_bearer("expired.or.garbage")
        .json(&json!({ "refreshToken": str_field(&mine, "refreshToken")?, "all": true }))
        .await
        .assert_status_ok();
    assert_eq!(state.refresh.len().await, 1);

    server
        .post("/refresh-token")
        .json(&json!({ "refreshToken": str_field(&other_device, "refreshToken")? }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn logout_always_succeeds() -> anyhow::Result<()> {
    let (server, _) = test_server()?;
    server.post("/logout").await.assert_status_ok();
    server.post("/logout").bytes("garbage".into()).await.assert_status_ok();
    Ok(())
}

// -- Health + persistence ---------------------------------------------------

#[tokio::test]
async fn health_reports_user_count() -> anyhow::Result<()> {
    let (server, _) = test_server()?;
    register(&server, "a@x.com", "password1").await.assert_status(StatusCode::CREATED);
    let body: Value = server.get("/health").await.json();
    assert_eq!(body["status"], "running");
    assert_eq!(body["users"], 1);
    Ok(())
}

#[tokio::test]
async fn file_backed_users_survive_restart() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = test_config();
    config.data_file = Some(dir.path().join("users.json"));

    {
        let server = TestServer::new(build_router(test_state(config.clone())?))?;
        register(&server, "a@x.com", "password1").await.assert_status(StatusCode::CREATED);
    }

    let server = TestServer::new(build_router(test_state(config)?))?;
    register(&server, "a@x.com", "password1").await.assert_status(StatusCode::CONFLICT);
    login(&server, "a@x.com", "password1").await.assert_status_ok();
    Ok(())
}
