// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// User registration and token service.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "tollgated", version, about)]
pub struct ServerConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "TOLLGATE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 5000, env = "TOLLGATE_PORT")]
    pub port: u16,

    /// HMAC secret used to sign access tokens.
    #[arg(long, env = "TOLLGATE_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Access token lifetime in seconds.
    #[arg(long, default_value_t = 3600, env = "TOLLGATE_ACCESS_TTL_SECS")]
    pub access_ttl_secs: u64,

    /// Refresh token lifetime in seconds.
    #[arg(long, default_value_t = 7 * 24 * 3600, env = "TOLLGATE_REFRESH_TTL_SECS")]
    pub refresh_ttl_secs: u64,

    /// JSON file backing the user collection. In-memory only when unset.
    #[arg(long, env = "TOLLGATE_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Argon2 memory cost in KiB.
    #[arg(long, default_value_t = 19 * 1024, env = "TOLLGATE_HASH_MEMORY_KIB")]
    pub hash_memory_kib: u32,

    /// Argon2 iteration count.
    #[arg(long, default_value_t = 2, env = "TOLLGATE_HASH_ITERATIONS")]
    pub hash_iterations: u32,

    /// Log format (text or json).
    #[arg(long, env = "TOLLGATE_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "TOLLGATE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ServerConfig {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jwt_secret.len() < 16 {
            anyhow::bail!("--jwt-secret must be at least 16 bytes");
        }
        if self.access_ttl_secs == 0 {
            anyhow::bail!("--access-ttl-secs must be positive");
        }
        if self.refresh_ttl_secs < self.access_ttl_secs {
            anyhow::bail!("--refresh-ttl-secs must not be shorter than --access-ttl-secs");
        }
        if !matches!(self.log_format.as_str(), "text" | "json") {
            anyhow::bail!("invalid log format: {}", self.log_format);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
