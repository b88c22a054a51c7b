// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-local credential storage.
//!
//! Credentials live under fixed key names in a small key-value slot. The
//! file-backed slot keeps a JSON object on disk and rewrites it atomically on
//! every change.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Persistent key-value slot holding the session credentials.
pub trait CredentialSlot: Send + Sync {
    fn load(&self, key: &str) -> Option<String>;
    fn store(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// Process-local slot. Contents vanish with the process.
#[derive(Default)]
pub struct MemorySlot {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialSlot for MemorySlot {
    fn load(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn store(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// Slot backed by a JSON object file.
pub struct FileSlot {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl FileSlot {
    /// Open the slot at `path`. A missing file is an empty slot.
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let values = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, values: Mutex::new(values) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, values: &HashMap<String, String>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(values)?;
        let tmp_name = format!(
            "{}.{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
        );
        let tmp_path = self.path.with_file_name(tmp_name);
        std::fs::write(&tmp_path, json)?;
        restrict_permissions(&tmp_path)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

impl CredentialSlot for FileSlot {
    fn load(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    // The lock is held across the write so concurrent updates serialize.
    fn store(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut values = self.values.lock();
        let previous = values.insert(key.to_owned(), value.to_owned());
        if let Err(e) = self.save(&values) {
            match previous {
                Some(old) => values.insert(key.to_owned(), old),
                None => values.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let mut values = self.values.lock();
        if values.remove(key).is_none() {
            return Ok(());
        }
        self.save(&values)
    }
}

/// Resolve the state directory for client data.
///
/// Checks `TOLLGATE_STATE_DIR`, then `$XDG_STATE_HOME/tollgate`,
/// then `$HOME/.local/state/tollgate`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TOLLGATE_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("tollgate");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/tollgate");
    }
    PathBuf::from(".tollgate")
}

#[cfg(test)]
#[path = "slot_tests.rs"]
mod tests;
