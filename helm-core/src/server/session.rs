//! Per-connection sessions and the authenticated-client directory.
//!
//! A [`Session`] is exclusively owned by its connection's handling
//! task; the [`SessionRegistry`] holds only a non-owning entry keyed
//! by an opaque [`ConnectionId`] (never the raw socket or fd, so a
//! recycled descriptor can never alias a stale entry). Registry
//! removal is idempotent: teardown racing an error path still removes
//! the entry exactly once.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use crate::error::HelmError;

// ── ConnectionId ─────────────────────────────────────────────────

/// Opaque identifier for one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ── Session ──────────────────────────────────────────────────────

/// Server-side state for one connection.
#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    authenticated: bool,
    username: Option<String>,
    last_active_at: Instant,
}

impl Session {
    fn new(id: ConnectionId, now: Instant) -> Self {
        Self {
            id,
            authenticated: false,
            username: None,
            last_active_at: now,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn last_active_at(&self) -> Instant {
        self.last_active_at
    }

    /// Record inbound activity.
    pub fn touch(&mut self, now: Instant) {
        self.last_active_at = now;
    }

    /// Flip to authenticated. Flips exactly once per connection; a
    /// second `Auth` on an already-authenticated session is a
    /// protocol violation.
    pub fn authenticate(&mut self, username: &str, now: Instant) -> Result<(), HelmError> {
        if self.authenticated {
            return Err(HelmError::ProtocolViolation(
                "session is already authenticated",
            ));
        }
        self.authenticated = true;
        self.username = Some(username.to_string());
        self.last_active_at = now;
        Ok(())
    }
}

// ── SessionRegistry ──────────────────────────────────────────────

/// Directory entry: what the registry knows about a live connection.
#[derive(Debug, Clone)]
struct DirectoryEntry {
    username: Option<String>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: u64,
    by_id: HashMap<ConnectionId, DirectoryEntry>,
    by_username: HashMap<String, ConnectionId>,
}

/// Concurrent directory of live sessions.
///
/// One mutex guards the whole map; readers and writers never observe
/// a half-updated entry.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: Mutex<RegistryInner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an ID and create the unauthenticated session for a
    /// freshly accepted connection.
    pub fn open_session(&self, now: Instant) -> Session {
        let mut inner = self.inner.lock().expect("registry lock");
        inner.next_id += 1;
        let id = ConnectionId(inner.next_id);
        inner.by_id.insert(id, DirectoryEntry { username: None });
        Session::new(id, now)
    }

    /// Record a successful authentication in the directory.
    ///
    /// If the same username is already registered on another live
    /// connection, the newer login wins the username index; the old
    /// connection keeps its per-connection session until its own
    /// teardown. Returns the evicted connection's ID, if any.
    pub fn mark_authenticated(
        &self,
        id: ConnectionId,
        username: &str,
    ) -> Option<ConnectionId> {
        let mut inner = self.inner.lock().expect("registry lock");
        if let Some(entry) = inner.by_id.get_mut(&id) {
            entry.username = Some(username.to_string());
        }
        let evicted = inner
            .by_username
            .insert(username.to_string(), id)
            .filter(|prev| *prev != id);
        if let Some(prev) = evicted {
            tracing::info!("{username}: new login evicts directory entry for {prev}");
        }
        evicted
    }

    /// Remove a session from the directory. Idempotent: returns
    /// `true` only for the call that actually removed the entry.
    ///
    /// The username index is only cleared if it still points at this
    /// connection, so a newer login is never clobbered by the old
    /// connection's teardown.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let mut inner = self.inner.lock().expect("registry lock");
        let Some(entry) = inner.by_id.remove(&id) else {
            return false;
        };
        if let Some(username) = entry.username
            && inner.by_username.get(&username) == Some(&id)
        {
            inner.by_username.remove(&username);
        }
        true
    }

    /// Look up the connection currently registered for a username.
    pub fn lookup(&self, username: &str) -> Option<ConnectionId> {
        self.inner
            .lock()
            .expect("registry lock")
            .by_username
            .get(username)
            .copied()
    }

    /// Number of live connections (authenticated or not).
    pub fn len(&self) -> usize {
        self.inner.lock().expect("registry lock").by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_start_unauthenticated() {
        let registry = SessionRegistry::new();
        let session = registry.open_session(Instant::now());
        assert!(!session.is_authenticated());
        assert!(session.username().is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn connection_ids_are_unique() {
        let registry = SessionRegistry::new();
        let a = registry.open_session(Instant::now());
        let b = registry.open_session(Instant::now());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn authenticate_flips_exactly_once() {
        let registry = SessionRegistry::new();
        let now = Instant::now();
        let mut session = registry.open_session(now);

        session.authenticate("operator", now).unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.username(), Some("operator"));

        let err = session.authenticate("operator", now).unwrap_err();
        assert!(matches!(err, HelmError::ProtocolViolation(_)));
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = SessionRegistry::new();
        let session = registry.open_session(Instant::now());
        let id = session.id();

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_login_last_write_wins() {
        let registry = SessionRegistry::new();
        let now = Instant::now();
        let old = registry.open_session(now);
        let new = registry.open_session(now);

        assert_eq!(registry.mark_authenticated(old.id(), "operator"), None);
        assert_eq!(registry.lookup("operator"), Some(old.id()));

        // Second login by the same username evicts the first.
        assert_eq!(
            registry.mark_authenticated(new.id(), "operator"),
            Some(old.id())
        );
        assert_eq!(registry.lookup("operator"), Some(new.id()));
    }

    #[test]
    fn stale_teardown_does_not_clobber_newer_login() {
        let registry = SessionRegistry::new();
        let now = Instant::now();
        let old = registry.open_session(now);
        let new = registry.open_session(now);

        registry.mark_authenticated(old.id(), "operator");
        registry.mark_authenticated(new.id(), "operator");

        // The evicted connection finally tears down.
        assert!(registry.remove(old.id()));
        // The newer login's index entry survives.
        assert_eq!(registry.lookup("operator"), Some(new.id()));

        assert!(registry.remove(new.id()));
        assert_eq!(registry.lookup("operator"), None);
    }

    #[test]
    fn reauthenticating_same_connection_is_not_an_eviction() {
        let registry = SessionRegistry::new();
        let session = registry.open_session(Instant::now());
        registry.mark_authenticated(session.id(), "operator");
        assert_eq!(registry.mark_authenticated(session.id(), "operator"), None);
    }
}
