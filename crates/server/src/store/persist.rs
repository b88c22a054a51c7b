// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User collection persistence: load/save to JSON file with atomic writes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::store::UserRecord;

/// On-disk form of the user collection.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PersistedUsers {
    #[serde(default)]
    pub users: Vec<UserRecord>,
}

/// Load the collection, treating a missing file as empty.
pub fn load(path: &Path) -> anyhow::Result<PersistedUsers> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PersistedUsers::default()),
        Err(e) => return Err(e.into()),
    };
    let users: PersistedUsers = serde_json::from_str(&contents)?;
    Ok(users)
}

/// Save the collection atomically (write tmp + rename).
///
/// The temp name carries PID + counter so concurrent saves never share a
/// `.tmp` file.
pub fn save(path: &Path, users: &PersistedUsers) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(users)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
