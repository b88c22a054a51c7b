// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests: real server, real client, loopback HTTP.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use tollgate_client::slot::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use tollgate_client::{ClientError, CredentialSlot, SessionEvent};
use tollgate_specs::{test_config, TollgateServer};

#[tokio::test]
async fn register_login_profile_scenario() -> anyhow::Result<()> {
    let server = TollgateServer::start(test_config(3600)).await?;
    let (api, slot) = server.client()?;

    let user = api.register("a@x.com", "password1", None).await?;
    assert_eq!(user.email, "a@x.com");

    let dup = api.register("a@x.com", "password1", None).await;
    assert!(matches!(dup, Err(ClientError::Conflict(_))), "got {dup:?}");

    let login = api.login("a@x.com", "password1").await?;
    assert_eq!(login.token_type, "Bearer");
    assert_eq!(slot.load(ACCESS_TOKEN_KEY).as_deref(), Some(login.access_token.as_str()));

    let profile = api.profile().await?;
    assert_eq!(profile.authenticated_user.email, "a@x.com");
    assert_eq!(profile.authenticated_user.sub, user.id);

    // Without a token the protected route refuses, and no refresh can help.
    let (anonymous, _) = server.client()?;
    let result = anonymous.profile().await;
    assert!(matches!(result, Err(ClientError::SessionExpired)), "got {result:?}");

    let raw = reqwest::get(format!("{}/profile", server.base_url())).await?;
    assert_eq!(raw.status().as_u16(), 401);
    Ok(())
}

#[tokio::test]
async fn validation_errors_are_joined() -> anyhow::Result<()> {
    let server = TollgateServer::start(test_config(3600)).await?;
    let (api, _) = server.client()?;

    match api.register("not-an-email", "123", None).await {
        Err(ClientError::Validation(msg)) => {
            assert!(msg.contains("; "), "expected joined messages, got {msg}");
        }
        other => anyhow::bail!("expected Validation, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_unauthorized() -> anyhow::Result<()> {
    let server = TollgateServer::start(test_config(3600)).await?;
    let (api, slot) = server.client()?;
    api.register("b@x.com", "password1", Some("Bea")).await?;

    let result = api.login("b@x.com", "wrong-password").await;
    assert!(matches!(result, Err(ClientError::Unauthorized(_))), "got {result:?}");
    assert_eq!(slot.load(ACCESS_TOKEN_KEY), None);
    assert!(!api.is_authenticated());
    Ok(())
}

#[tokio::test]
async fn expired_access_token_refreshes_once_for_concurrent_calls() -> anyhow::Result<()> {
    let server = TollgateServer::start(test_config(1)).await?;
    let (api, slot) = server.client()?;
    api.register("c@x.com", "password1", Some("Cy")).await?;
    api.login("c@x.com", "password1").await?;
    let first_refresh = slot.load(REFRESH_TOKEN_KEY);
    let mut events = api.subscribe();

    tokio::time::sleep(Duration::from_millis(2100)).await;

    let api = Arc::new(api);
    let calls = (0..6).map(|_| {
        let api = Arc::clone(&api);
        async move { api.profile().await }
    });
    for result in join_all(calls).await {
        assert_eq!(result?.authenticated_user.name.as_deref(), Some("Cy"));
    }

    assert_eq!(events.recv().await?, SessionEvent::Refreshed);
    assert!(events.try_recv().is_err(), "expected a single refresh");
    assert_ne!(slot.load(REFRESH_TOKEN_KEY), first_refresh);
    Ok(())
}

#[tokio::test]
async fn rotated_refresh_token_cannot_be_replayed() -> anyhow::Result<()> {
    let server = TollgateServer::start(test_config(3600)).await?;
    let (api, slot) = server.client()?;
    api.register("d@x.com", "password1", None).await?;
    api.login("d@x.com", "password1").await?;
    let old = slot.load(REFRESH_TOKEN_KEY).ok_or_else(|| anyhow::anyhow!("no refresh token"))?;

    api.refresh().await?;

    let resp = reqwest::Client::new()
        .post(format!("{}/refresh-token", server.base_url()))
        .json(&serde_json::json!({ "refreshToken": old }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 401);
    Ok(())
}

#[tokio::test]
async fn logout_revokes_refresh_token() -> anyhow::Result<()> {
    let server = TollgateServer::start(test_config(3600)).await?;
    let (api, slot) = server.client()?;
    api.register("e@x.com", "password1", None).await?;
    api.login("e@x.com", "password1").await?;
    let refresh = slot.load(REFRESH_TOKEN_KEY).ok_or_else(|| anyhow::anyhow!("no refresh token"))?;

    api.logout(false).await?;
    assert!(!api.is_authenticated());

    let resp = reqwest::Client::new()
        .post(format!("{}/refresh-token", server.base_url()))
        .json(&serde_json::json!({ "refreshToken": refresh }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 401);
    Ok(())
}

#[tokio::test]
async fn revoked_session_expires_client() -> anyhow::Result<()> {
    let server = TollgateServer::start(test_config(1)).await?;
    let (api, slot) = server.client()?;
    api.register("f@x.com", "password1", None).await?;
    api.login("f@x.com", "password1").await?;
    let mut events = api.subscribe();

    // Another device signs out everywhere.
    let (other, _) = server.client()?;
    other.login("f@x.com", "password1").await?;
    other.logout(true).await?;

    tokio::time::sleep(Duration::from_millis(2100)).await;

    let result = api.profile().await;
    assert!(matches!(result, Err(ClientError::SessionExpired)), "got {result:?}");
    assert_eq!(slot.load(ACCESS_TOKEN_KEY), None);
    assert_eq!(slot.load(REFRESH_TOKEN_KEY), None);
    assert_eq!(events.recv().await?, SessionEvent::Expired);
    Ok(())
}

#[tokio::test]
async fn logout_all_after_access_expiry_revokes_other_sessions() -> anyhow::Result<()> {
    let server = TollgateServer::start(test_config(1)).await?;
    let (api, _) = server.client()?;
    api.register("h@x.com", "password1", None).await?;
    api.login("h@x.com", "password1").await?;

    let (other, other_slot) = server.client()?;
    other.login("h@x.com", "password1").await?;
    let other_refresh =
        other_slot.load(REFRESH_TOKEN_KEY).ok_or_else(|| anyhow::anyhow!("no refresh token"))?;

    // Both access tokens are expired by now; only the refresh token identifies the account.
    tokio::time::sleep(Duration::from_millis(2100)).await;
    api.logout(true).await?;

    let resp = reqwest::Client::new()
        .post(format!("{}/refresh-token", server.base_url()))
        .json(&serde_json::json!({ "refreshToken": other_refresh }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 401);
    Ok(())
}

#[tokio::test]
async fn users_survive_restart_with_data_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let data = dir.path().join("users.json");

    let server = TollgateServer::start_with_data(3600, data.clone()).await?;
    let (api, _) = server.client()?;
    api.register("g@x.com", "password1", None).await?;
    server.stop();
    drop(server);

    let server = TollgateServer::start_with_data(3600, data).await?;
    let (api, _) = server.client()?;
    let login = api.login("g@x.com", "password1").await?;
    assert_eq!(login.user.email, "g@x.com");
    Ok(())
}
