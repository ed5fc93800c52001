// ============================
// crates/backend-lib/src/auth/session.rs
// ============================
//! Session token handling and management.
//!
//! Each identity has at most one live session. Creating a session for an
//! identity supersedes the previous one: the store keeps a per-identity
//! pointer to the active session id and swaps it under the identity's entry
//! lock, so a session is only ever valid while it is the pointer's target.
use super::clock::{Clock, SystemClock};
use super::token_generator::{generate_secure_token, token_fingerprint};
use crate::error::AppError;
use crate::identity::Identity;
use crate::metrics::{SESSION_ACTIVE, SESSION_CREATED, SESSION_EXPIRED, SESSION_LOGGED_OUT, SESSION_SUPERSEDED};
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use metrics::{counter, gauge};
use std::{
    fmt,
    sync::Arc,
    time::{Duration, SystemTime},
};
use tracing::{debug, info};

/// Session lifetime regardless of activity
pub const SESSION_ABSOLUTE_TTL: Duration = Duration::from_secs(60 * 60 * 8); // 8 hours

/// Session lifetime without activity
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(60 * 30); // 30 minutes

/// Attempts at drawing an unused session id before giving up
const MAX_ID_ATTEMPTS: usize = 3;

/// Session information
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    /// Login name of the bound identity. The identity itself is owned by the credential store.
    pub username: String,
    pub csrf_token: String,
    pub created_at: SystemTime,
    pub last_activity: SystemTime,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &token_fingerprint(&self.id))
            .field("username", &self.username)
            .field("created_at", &self.created_at)
            .field("last_activity", &self.last_activity)
            .finish_non_exhaustive()
    }
}

/// A new session's id is already taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionIdCollision;

/// Keyed session storage
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store `session` and make it its identity's only active session.
    /// Returns the session it superseded, if any.
    async fn activate(&self, session: Session) -> Result<Option<Session>, SessionIdCollision>;

    /// Fetch a session if it is its identity's active session
    async fn get(&self, id: &str) -> Option<Session>;

    /// Record activity on a session
    async fn touch(&self, id: &str, at: SystemTime);

    /// Delete a session, returning it if it existed
    async fn remove(&self, id: &str) -> Option<Session>;

    /// Id of the identity's active session
    async fn active_for(&self, username: &str) -> Option<String>;

    /// Copy of every stored session
    async fn snapshot(&self) -> Vec<Session>;

    /// Number of stored sessions
    async fn len(&self) -> usize;
}

/// Process-local session store
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
    active: DashMap<String, String>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn activate(&self, session: Session) -> Result<Option<Session>, SessionIdCollision> {
        let id = session.id.clone();
        let username = session.username.clone();

        // Not yet visible: `get` requires the identity pointer to name it
        match self.sessions.entry(id.clone()) {
            Entry::Occupied(_) => return Err(SessionIdCollision),
            Entry::Vacant(slot) => {
                slot.insert(session);
            },
        }

        let previous = match self.active.entry(username) {
            Entry::Occupied(mut slot) => Some(slot.insert(id)),
            Entry::Vacant(slot) => {
                slot.insert(id);
                None
            },
        };

        Ok(previous.and_then(|old| self.sessions.remove(&old).map(|(_, s)| s)))
    }

    async fn get(&self, id: &str) -> Option<Session> {
        let session = self.sessions.get(id)?.value().clone();
        let is_active = self
            .active
            .get(&session.username)
            .is_some_and(|active| active.value() == id);
        is_active.then_some(session)
    }

    async fn touch(&self, id: &str, at: SystemTime) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.last_activity = at;
        }
    }

    async fn remove(&self, id: &str) -> Option<Session> {
        let (_, session) = self.sessions.remove(id)?;
        self.active.remove_if(&session.username, |_, active| active == id);
        Some(session)
    }

    async fn active_for(&self, username: &str) -> Option<String> {
        self.active.get(username).map(|id| id.value().clone())
    }

    async fn snapshot(&self) -> Vec<Session> {
        self.sessions.iter().map(|entry| entry.value().clone()).collect()
    }

    async fn len(&self) -> usize {
        self.sessions.len()
    }
}

/// Why a stored session is no longer usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expiry {
    Idle,
    Absolute,
}

/// Session manager for handling authentication tokens
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    absolute_ttl: Duration,
    idle_ttl: Duration,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("clock", &self.clock)
            .field("absolute_ttl", &self.absolute_ttl)
            .field("idle_ttl", &self.idle_ttl)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a new session manager with default timeouts
    pub fn new() -> Self {
        Self::new_with_timeouts(SESSION_ABSOLUTE_TTL, SESSION_IDLE_TTL)
    }

    /// Create a new session manager with custom timeouts
    pub fn new_with_timeouts(absolute_ttl: Duration, idle_ttl: Duration) -> Self {
        Self::with_parts(
            Arc::new(InMemorySessionStore::new()),
            Arc::new(SystemClock),
            absolute_ttl,
            idle_ttl,
        )
    }

    /// Create a session manager over an explicit store and clock
    pub fn with_parts(
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        absolute_ttl: Duration,
        idle_ttl: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            absolute_ttl,
            idle_ttl,
        }
    }

    /// Start a session for a verified identity, superseding its previous one
    pub async fn create(&self, identity: &Identity) -> Result<Session, AppError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let now = self.clock.now();
            let session = Session {
                id: generate_secure_token(),
                username: identity.username().to_string(),
                csrf_token: generate_secure_token(),
                created_at: now,
                last_activity: now,
            };

            match self.store.activate(session.clone()).await {
                Ok(superseded) => {
                    counter!(SESSION_CREATED).increment(1);
                    if let Some(old) = superseded {
                        counter!(SESSION_SUPERSEDED).increment(1);
                        info!(
                            username = %old.username,
                            session = token_fingerprint(&old.id),
                            "previous session superseded by new login"
                        );
                    }
                    gauge!(SESSION_ACTIVE).set(self.store.len().await as f64);
                    return Ok(session);
                },
                Err(SessionIdCollision) => {
                    debug!("session id collision, drawing a new id");
                },
            }
        }

        Err(AppError::Internal("could not allocate a session id".to_string()))
    }

    /// Resolve a session id to its live session, refreshing its activity time
    pub async fn validate(&self, id: &str) -> Result<Session, AppError> {
        let Some(session) = self.store.get(id).await else {
            debug!(session = token_fingerprint(id), "unknown or superseded session");
            return Err(AppError::SessionInvalid);
        };

        let now = self.clock.now();
        if let Some(expiry) = self.expiry(&session, now) {
            self.store.remove(id).await;
            counter!(SESSION_EXPIRED).increment(1);
            debug!(
                username = %session.username,
                session = token_fingerprint(id),
                ?expiry,
                "session expired"
            );
            return Err(AppError::SessionInvalid);
        }

        self.store.touch(id, now).await;
        Ok(Session {
            last_activity: now,
            ..session
        })
    }

    /// End a session. Unknown or already-ended sessions are ignored.
    pub async fn invalidate(&self, id: &str) {
        if let Some(session) = self.store.remove(id).await {
            counter!(SESSION_LOGGED_OUT).increment(1);
            gauge!(SESSION_ACTIVE).set(self.store.len().await as f64);
            debug!(username = %session.username, "session invalidated");
        }
    }

    /// End whatever session the identity currently holds
    pub async fn invalidate_identity(&self, username: &str) {
        if let Some(id) = self.store.active_for(username).await {
            self.invalidate(&id).await;
        }
    }

    /// Remove expired sessions, returning how many were dropped
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        for session in self.store.snapshot().await {
            if self.expiry(&session, now).is_some() && self.store.remove(&session.id).await.is_some() {
                removed += 1;
            }
        }

        if removed > 0 {
            counter!(SESSION_EXPIRED).increment(removed as u64);
            gauge!(SESSION_ACTIVE).set(self.store.len().await as f64);
        }
        removed
    }

    /// Return count of stored sessions
    pub async fn active_count(&self) -> usize {
        self.store.len().await
    }

    fn expiry(&self, session: &Session, now: SystemTime) -> Option<Expiry> {
        let age = now.duration_since(session.created_at).unwrap_or_default();
        let idle = now.duration_since(session.last_activity).unwrap_or_default();
        if age > self.absolute_ttl {
            Some(Expiry::Absolute)
        } else if idle > self.idle_ttl {
            Some(Expiry::Idle)
        } else {
            None
        }
    }
}
