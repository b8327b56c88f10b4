//! Per-user session storage.
//!
//! The admin keeps only small preferences here (the dashboard widget order),
//! so a session is a JSON key-value map plus expiry metadata. Storage backends
//! implement [`SessionStore`]; [`MemorySessionStore`] keeps everything in
//! process.

use crate::error::{AdminError, AdminResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Two weeks, the usual browser-session cookie age.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Session data structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier
    pub id: String,
    /// Session data as key-value pairs
    pub data: HashMap<String, serde_json::Value>,
    /// Session creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last access timestamp
    pub last_accessed_at: DateTime<Utc>,
    /// Session expiration timestamp
    pub expires_at: DateTime<Utc>,
    /// Set by every write; stores only persist modified sessions
    #[serde(skip)]
    modified: bool,
}

impl Session {
    /// Create a new session with the given ID and TTL.
    pub fn new(id: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            data: HashMap::new(),
            created_at: now,
            last_accessed_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or_default(),
            modified: false,
        }
    }

    /// Check if the session has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Get a value from the session data.
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Set a value in the session data.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> AdminResult<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| AdminError::Session(format!("cannot store {}: {}", key, e)))?;
        self.data.insert(key.to_string(), json_value);
        self.modified = true;
        Ok(())
    }

    /// Remove a value from the session data.
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        let removed = self.data.remove(key);
        if removed.is_some() {
            self.modified = true;
        }
        removed
    }

    /// Check if a key exists in the session data.
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Flag the session for saving without changing data.
    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Update the last accessed timestamp.
    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
    }
}

/// Session store for different storage backends.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create and persist a new empty session.
    async fn create(&self, ttl: Option<Duration>) -> AdminResult<Session>;

    /// `Ok(None)` when the session is unknown or expired.
    async fn get(&self, session_id: &str) -> AdminResult<Option<Session>>;

    /// Save/update a session.
    async fn save(&self, session: &Session) -> AdminResult<()>;

    /// Delete a session.
    async fn delete(&self, session_id: &str) -> AdminResult<()>;

    /// Check if a session exists and is valid.
    async fn exists(&self, session_id: &str) -> AdminResult<bool> {
        Ok(self.get(session_id).await?.is_some())
    }

    /// Get the number of stored sessions.
    async fn count(&self) -> AdminResult<usize>;

    /// Load a session, or create one when the id is missing or stale.
    async fn load_or_create(&self, session_id: Option<&str>) -> AdminResult<Session> {
        if let Some(id) = session_id {
            if let Some(session) = self.get(id).await? {
                return Ok(session);
            }
        }
        self.create(None).await
    }
}

/// Generate a new unique session ID.
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// In-process session store
#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: DashMap<String, Session>,
    default_ttl: Duration,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }

    pub fn with_ttl(default_ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            default_ttl,
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, ttl: Option<Duration>) -> AdminResult<Session> {
        let session = Session::new(generate_session_id(), ttl.unwrap_or(self.default_ttl));
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn get(&self, session_id: &str) -> AdminResult<Option<Session>> {
        let expired = match self.sessions.get(session_id) {
            Some(session) if !session.is_expired() => {
                let mut session = session.clone();
                session.touch();
                return Ok(Some(session));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.sessions.remove(session_id);
        }
        Ok(None)
    }

    async fn save(&self, session: &Session) -> AdminResult<()> {
        let mut stored = session.clone();
        stored.modified = false;
        self.sessions.insert(stored.id.clone(), stored);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> AdminResult<()> {
        self.sessions.remove(session_id);
        Ok(())
    }

    async fn count(&self) -> AdminResult<usize> {
        Ok(self.sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_values() {
        let mut session = Session::new("s1", Duration::from_secs(60));
        assert!(!session.is_modified());

        session.set("layout", vec!["kpi-cards"]).unwrap();
        assert!(session.is_modified());
        assert_eq!(session.get::<Vec<String>>("layout"), Some(vec!["kpi-cards".to_string()]));
        assert_eq!(session.get::<i64>("layout"), None);

        assert!(session.remove("layout").is_some());
        assert!(!session.contains("layout"));
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemorySessionStore::new();
        let mut session = store.create(None).await.unwrap();
        session.set("answer", 42).unwrap();
        store.save(&session).await.unwrap();

        let loaded = store.get(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.get::<i64>("answer"), Some(42));
        assert!(!loaded.is_modified());
        assert_eq!(store.count().await.unwrap(), 1);

        store.delete(&session.id).await.unwrap();
        assert!(!store.exists(&session.id).await.unwrap());
    }

    #[test]
    fn test_expired_sessions_are_dropped() {
        let store = MemorySessionStore::with_ttl(Duration::from_secs(0));
        let session = tokio_test::block_on(store.create(None)).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        tokio_test::block_on(async {
            assert!(store.get(&session.id).await.unwrap().is_none());
            assert_eq!(store.count().await.unwrap(), 0);

            let fresh = store.load_or_create(Some(&session.id)).await.unwrap();
            assert_ne!(fresh.id, session.id);
        });
    }
}
