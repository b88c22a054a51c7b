// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

/// Command-line client for a tollgate server.
#[derive(Debug, Parser)]
#[command(name = "tollgate", version, about)]
pub struct ClientConfig {
    /// Server base URL.
    #[arg(long, env = "TOLLGATE_URL", default_value = "http://127.0.0.1:5000")]
    pub url: String,

    /// Directory holding the credential file.
    #[arg(long, env = "TOLLGATE_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "TOLLGATE_TIMEOUT_SECS", default_value = "10")]
    pub timeout_secs: u64,

    /// Log filter (overridden by RUST_LOG).
    #[arg(long, env = "TOLLGATE_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an account.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TOLLGATE_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Log in and store credentials.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TOLLGATE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Show the protected profile.
    Profile,
    /// Exchange the refresh token for a new access token.
    Refresh,
    /// Revoke the session and clear stored credentials.
    Logout {
        /// Revoke every session of this user.
        #[arg(long)]
        all: bool,
    },
    /// Report whether credentials are stored locally.
    Status,
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Credential file location.
    pub fn credentials_path(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(crate::slot::state_dir).join("credentials.json")
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            anyhow::bail!("--url must start with http:// or https://");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("--timeout-secs must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
