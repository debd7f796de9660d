//! Session snapshots
//!
//! A [`Session`] is built once from a backend profile and never mutated.
//! Refreshing a session builds a new snapshot and swaps it into the store,
//! so a request that already holds an `Arc<Session>` keeps a consistent view.

use crate::access::Principal;
use crate::api::Profile;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Opaque session identifier stored in the session cookie
pub type SessionId = String;

/// Absolute session lifetime (12 hours), matching the cookie max-age
pub const SESSION_MAX_AGE_HOURS: i64 = 12;

/// Immutable authentication snapshot
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    /// Bearer token for the backend API
    pub token: String,
    pub user: UserInfo,
    pub principal: Principal,
    pub created_at: DateTime<Utc>,
    pub refreshed_at: DateTime<Utc>,
}

/// User info (safe to expose)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
}

impl From<&Profile> for UserInfo {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id.clone(),
            username: profile.username.clone(),
        }
    }
}

impl Session {
    /// Fresh session for a newly issued token
    pub fn new(token: String, profile: &Profile) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            token,
            user: UserInfo::from(profile),
            principal: principal_from(profile),
            created_at: now,
            refreshed_at: now,
        }
    }

    /// New snapshot for the same session with a re-fetched profile
    pub fn refreshed(&self, profile: &Profile) -> Self {
        Self {
            id: self.id.clone(),
            token: self.token.clone(),
            user: UserInfo::from(profile),
            principal: principal_from(profile),
            created_at: self.created_at,
            refreshed_at: Utc::now(),
        }
    }
}

fn principal_from(profile: &Profile) -> Principal {
    Principal::new(profile.roles.iter().cloned(), profile.permissions.iter().cloned())
}

/// Session snapshots by id
///
/// Snapshots older than the store's max age are treated as absent and swept
/// on the next insert.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    max_age: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_max_age(Duration::hours(SESSION_MAX_AGE_HOURS))
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_age(max_age: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_age,
        }
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        now - session.created_at >= self.max_age
    }

    pub fn insert(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        let now = Utc::now();
        let mut sessions = self.sessions.write();

        let before = sessions.len();
        sessions.retain(|_, s| !self.is_expired(s, now));
        if sessions.len() < before {
            debug!(swept = before - sessions.len(), "Swept expired sessions");
        }

        sessions.insert(session.id.clone(), session.clone());
        session
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.read().get(id).cloned()?;

        if self.is_expired(&session, Utc::now()) {
            self.sessions.write().remove(id);
            debug!(session = %id, "Session expired");
            return None;
        }

        Some(session)
    }

    /// Swap in a new snapshot; returns `None` if the session was removed meanwhile
    pub fn replace(&self, session: Session) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write();
        let slot = sessions.get_mut(&session.id)?;
        let session = Arc::new(session);
        *slot = session.clone();
        Some(session)
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
