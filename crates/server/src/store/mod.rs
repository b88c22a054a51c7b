// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User collection: one document per registered user, unique by email.
//!
//! Records live in memory behind an `RwLock` and are optionally mirrored to a
//! JSON file (`--data-file`). Every write is persisted before the lock is
//! released; a failed save rolls the in-memory change back.

pub mod persist;

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::state::epoch_ms;

/// A stored user document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub password_hash: String,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl UserRecord {
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            created_at_ms: self.created_at_ms,
        }
    }
}

/// Public projection of a user. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub created_at_ms: u64,
}

/// Fields required to create a user. `password_hash` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
}

#[derive(Debug, thiserror::Error)]
pub enum InsertError {
    #[error("email already registered")]
    Conflict,
    #[error("failed to persist user collection: {0}")]
    Persist(anyhow::Error),
}

#[derive(Default)]
struct Collection {
    by_id: HashMap<String, UserRecord>,
    /// Normalized email -> id.
    by_email: HashMap<String, String>,
}

impl Collection {
    fn insert(&mut self, record: UserRecord) {
        self.by_email.insert(record.email.clone(), record.id.clone());
        self.by_id.insert(record.id.clone(), record);
    }

    fn remove(&mut self, id: &str) {
        if let Some(record) = self.by_id.remove(id) {
            self.by_email.remove(&record.email);
        }
    }

    fn snapshot(&self) -> persist::PersistedUsers {
        let mut users: Vec<UserRecord> = self.by_id.values().cloned().collect();
        users.sort_by(|a, b| a.created_at_ms.cmp(&b.created_at_ms).then(a.id.cmp(&b.id)));
        persist::PersistedUsers { users }
    }
}

/// Canonical form used for uniqueness and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct UserStore {
    inner: RwLock<Collection>,
    data_file: Option<PathBuf>,
}

impl UserStore {
    /// An empty, memory-only collection.
    pub fn in_memory() -> Self {
        Self { inner: RwLock::new(Collection::default()), data_file: None }
    }

    /// Open a file-backed collection, loading any existing documents.
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let persisted = persist::load(&path)?;
        let mut collection = Collection::default();
        for record in persisted.users {
            let key = normalize_email(&record.email);
            if collection.by_email.contains_key(&key) {
                tracing::warn!(email = %key, id = %record.id, "skipping duplicate email in data file");
                continue;
            }
            collection.insert(UserRecord { email: key, ..record });
        }
        tracing::info!(path = %path.display(), users = collection.by_id.len(), "loaded user collection");
        Ok(Self { inner: RwLock::new(collection), data_file: Some(path) })
    }

    /// Insert a new user, enforcing email uniqueness.
    pub async fn insert(&self, new: NewUser) -> Result<UserRecord, InsertError> {
        let email = normalize_email(&new.email);
        let mut inner = self.inner.write().await;
        if inner.by_email.contains_key(&email) {
            return Err(InsertError::Conflict);
        }

        let now = epoch_ms();
        let record = UserRecord {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            name: new.name,
            password_hash: new.password_hash,
            created_at_ms: now,
            updated_at_ms: now,
        };
        inner.insert(record.clone());

        if let Some(ref path) = self.data_file {
            if let Err(e) = persist::save(path, &inner.snapshot()) {
                inner.remove(&record.id);
                return Err(InsertError::Persist(e));
            }
        }
        Ok(record)
    }

    pub async fn find_by_email(&self, email: &str) -> Option<UserRecord> {
        let inner = self.inner.read().await;
        let id = inner.by_email.get(&normalize_email(email))?;
        inner.by_id.get(id).cloned()
    }

    pub async fn get(&self, id: &str) -> Option<UserRecord> {
        self.inner.read().await.by_id.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
