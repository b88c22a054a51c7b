// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use clap::Parser;
use tracing::error;

use tollgate_client::config::{ClientConfig, Command};
use tollgate_client::{ApiClient, ClientError, FileSlot, RequestCoordinator};

#[tokio::main]
async fn main() {
    let config = ClientConfig::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&config);

    if let Err(e) = run(config).await {
        match e.downcast_ref::<ClientError>() {
            Some(ClientError::SessionExpired) => eprintln!("session expired, please log in again"),
            Some(client) => eprintln!("error: {client}"),
            None => error!("fatal: {e:#}"),
        }
        std::process::exit(1);
    }
}

fn init_tracing(config: &ClientConfig) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(config: ClientConfig) -> anyhow::Result<()> {
    let slot = Arc::new(FileSlot::open(config.credentials_path())?);
    let coordinator = RequestCoordinator::new(&config.url, slot, config.timeout())?;
    let api = ApiClient::new(Arc::new(coordinator));

    match config.command {
        Command::Register { email, password, name } => {
            let user = api.register(&email, &password, name.as_deref()).await?;
            println!("registered {} ({})", user.email, user.id);
        }
        Command::Login { email, password } => {
            let resp = api.login(&email, &password).await?;
            println!("logged in as {} (token valid for {}s)", resp.user.email, resp.expires_in);
        }
        Command::Profile => {
            let profile = api.profile().await?;
            let user = profile.authenticated_user;
            println!("{}", profile.message);
            println!("  id:    {}", user.sub);
            println!("  email: {}", user.email);
            if let Some(name) = user.name {
                println!("  name:  {name}");
            }
        }
        Command::Refresh => {
            api.refresh().await?;
            println!("access token refreshed");
        }
        Command::Logout { all } => {
            api.logout(all).await?;
            println!("logged out");
        }
        Command::Status => {
            if api.is_authenticated() {
                println!("credentials stored");
            } else {
                println!("not logged in");
            }
        }
    }
    Ok(())
}
