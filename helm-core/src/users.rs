//! Credential store backed by a JSON user file.
//!
//! Stored digests are salted blake3, formatted `salt_hex:digest_hex`.
//! The plaintext password exists only transiently during
//! [`UserStore::verify`] and [`UserStore::add_user`]; the transport
//! layer never persists credentials.
//!
//! The whole store sits behind one lock: load/verify/update-last-login
//! and snapshot serialization happen under it, so two connections
//! authenticating at once never lose an update. The disk write itself
//! runs off the executor thread.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::HelmError;

const SALT_LENGTH: usize = 16;

/// One persisted account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    /// `salt_hex:digest_hex`.
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: Option<String>,
    pub last_login: Option<String>,
}

/// Thread-safe user directory.
pub struct UserStore {
    path: Option<PathBuf>,
    users: Mutex<HashMap<String, UserRecord>>,
}

impl UserStore {
    /// Load from a JSON file. A missing file yields an empty store;
    /// a corrupt file is an error.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, HelmError> {
        let path = path.into();
        let users = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: Some(path),
            users: Mutex::new(users),
        })
    }

    /// An unpersisted store (tests, ephemeral deployments).
    pub fn in_memory() -> Self {
        Self {
            path: None,
            users: Mutex::new(HashMap::new()),
        }
    }

    /// Verify credentials. On success the account's `last_login` is
    /// updated; the store snapshot is serialized under the lock and
    /// persisted off the executor thread.
    ///
    /// Every account takes the same verification path; there are no
    /// special-cased usernames.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        if username.is_empty() || password.is_empty() {
            return false;
        }
        let mut users = self.users.lock().expect("user store lock");
        let Some(record) = users.get_mut(username) else {
            return false;
        };
        if !verify_digest(&record.password, password) {
            return false;
        }
        record.last_login = Some(timestamp());
        match serde_json::to_string_pretty(&*users) {
            Ok(snapshot) => persist_snapshot(self.path.clone(), snapshot),
            Err(e) => tracing::error!("failed to serialize user store: {e}"),
        }
        true
    }

    /// Create an account. Fails if the username already exists.
    pub fn add_user(
        &self,
        username: &str,
        password: &str,
        is_admin: bool,
    ) -> Result<(), HelmError> {
        if username.is_empty() || password.is_empty() {
            return Err(HelmError::AuthenticationFailed(
                "username and password are required".into(),
            ));
        }
        let mut users = self.users.lock().expect("user store lock");
        if users.contains_key(username) {
            return Err(HelmError::AuthenticationFailed(format!(
                "user {username} already exists"
            )));
        }
        users.insert(
            username.to_string(),
            UserRecord {
                password: hash_password(password),
                is_admin,
                created_at: Some(timestamp()),
                last_login: None,
            },
        );
        save_locked(self.path.as_deref(), &users)
    }

    /// Number of accounts.
    pub fn len(&self) -> usize {
        self.users.lock().expect("user store lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The last recorded login time for an account, if any.
    pub fn last_login(&self, username: &str) -> Option<String> {
        self.users
            .lock()
            .expect("user store lock")
            .get(username)
            .and_then(|r| r.last_login.clone())
    }
}

// ── Hashing ──────────────────────────────────────────────────────

/// Derive a `salt_hex:digest_hex` entry from a plaintext password.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; SALT_LENGTH] = rand::random();
    format!("{}:{}", hex(&salt), digest_hex(&salt, password))
}

/// Constant-shape verification against a stored `salt:digest` entry.
fn verify_digest(stored: &str, password: &str) -> bool {
    let Some((salt_hex, digest)) = stored.split_once(':') else {
        return false;
    };
    let Some(salt) = unhex(salt_hex) else {
        return false;
    };
    digest_hex(&salt, password) == digest
}

fn digest_hex(salt: &[u8], password: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_hex().to_string()
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn unhex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn save_locked(
    path: Option<&Path>,
    users: &HashMap<String, UserRecord>,
) -> Result<(), HelmError> {
    let Some(path) = path else {
        return Ok(());
    };
    let text = serde_json::to_string_pretty(users)?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Write a serialized store snapshot without stalling an async
/// caller: on the blocking pool inside a runtime, inline otherwise.
/// The login timestamp is advisory, so a failed write only logs.
fn persist_snapshot(path: Option<PathBuf>, snapshot: String) {
    let Some(path) = path else {
        return;
    };
    let write = move || {
        if let Err(e) = std::fs::write(&path, snapshot) {
            tracing::error!("failed to persist user store {}: {e}", path.display());
        }
    };
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(write);
        }
        Err(_) => write(),
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_verify() {
        let store = UserStore::in_memory();
        store.add_user("operator", "hunter2", false).unwrap();

        assert!(store.verify("operator", "hunter2"));
        assert!(!store.verify("operator", "wrong"));
        assert!(!store.verify("nobody", "hunter2"));
    }

    #[test]
    fn empty_credentials_rejected() {
        let store = UserStore::in_memory();
        store.add_user("operator", "hunter2", false).unwrap();
        assert!(!store.verify("", "hunter2"));
        assert!(!store.verify("operator", ""));
        assert!(store.add_user("", "pw", false).is_err());
    }

    #[test]
    fn no_account_bypass() {
        // Every username takes the same path, `admin` included.
        let store = UserStore::in_memory();
        store.add_user("admin", "real-password", true).unwrap();
        assert!(!store.verify("admin", "anything"));
        assert!(!store.verify("admin", ""));
        assert!(store.verify("admin", "real-password"));
    }

    #[test]
    fn duplicate_username_rejected() {
        let store = UserStore::in_memory();
        store.add_user("a", "one", false).unwrap();
        assert!(store.add_user("a", "two", false).is_err());
    }

    #[test]
    fn salts_differ_between_hashes() {
        let h1 = hash_password("same");
        let h2 = hash_password("same");
        assert_ne!(h1, h2);
    }

    #[test]
    fn malformed_stored_digest_fails_closed() {
        assert!(!verify_digest("no-colon-here", "pw"));
        assert!(!verify_digest("zz:zz", "pw"));
        assert!(!verify_digest("", "pw"));
    }

    #[test]
    fn verify_records_last_login() {
        let store = UserStore::in_memory();
        store.add_user("operator", "hunter2", false).unwrap();
        assert!(store.last_login("operator").is_none());
        assert!(store.verify("operator", "hunter2"));
        assert!(store.last_login("operator").is_some());
    }

    #[test]
    fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");

        let store = UserStore::load(&path).unwrap();
        assert!(store.is_empty());
        store.add_user("operator", "hunter2", false).unwrap();
        drop(store);

        let reloaded = UserStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.verify("operator", "hunter2"));
    }

    #[tokio::test]
    async fn verify_persists_last_login_from_async_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");

        let store = UserStore::load(&path).unwrap();
        store.add_user("operator", "hunter2", false).unwrap();
        assert!(store.verify("operator", "hunter2"));

        // The snapshot write lands on the blocking pool; poll for it.
        let mut persisted = false;
        for _ in 0..100 {
            let reloaded = UserStore::load(&path).unwrap();
            if reloaded.last_login("operator").is_some() {
                persisted = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(persisted);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(UserStore::load(&path).is_err());
    }
}
