//! User sessions and the per-user serialized session store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::intake::IntakeState;

/// Per-user conversation state. Lives only as long as the process.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub state: IntakeState,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            state: IntakeState::Idle,
            created_at: now,
            last_active: now,
        }
    }

    /// Drop any partial intake and return to the menu state.
    pub fn reset(&mut self) {
        self.state = IntakeState::Idle;
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.last_active)
            .to_std()
            .unwrap_or_default()
    }
}

/// Session counts for the status endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SessionCounts {
    pub sessions: usize,
    pub in_intake: usize,
    /// Sessions with an event still being handled.
    pub busy: usize,
}

/// Key-value store of sessions. Each session sits behind its own mutex; a
/// handler holds that lock for the whole event, so transitions for one user
/// never interleave while different users proceed independently.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the session for a user, creating an idle one on first contact.
    pub async fn get_or_create(&self, user_id: &str) -> Arc<Mutex<Session>> {
        if let Some(session) = self.sessions.read().await.get(user_id) {
            return Arc::clone(session);
        }
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(user_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(user_id, "Session created");
                Arc::new(Mutex::new(Session::new(user_id)))
            });
        Arc::clone(session)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Count sessions and those mid-intake. Never waits on a session lock:
    /// a session whose handler is still running counts as busy instead.
    pub async fn counts(&self) -> SessionCounts {
        let sessions = self.sessions.read().await;
        let mut counts = SessionCounts {
            sessions: sessions.len(),
            ..SessionCounts::default()
        };
        for handle in sessions.values() {
            match handle.try_lock() {
                Ok(session) if session.state.is_collecting() => counts.in_intake += 1,
                Ok(_) => {}
                Err(_) => counts.busy += 1,
            }
        }
        counts
    }

    /// Drop idle sessions untouched for `max_idle`. Sessions mid-intake or
    /// currently held by a handler are kept. Returns how many were removed.
    pub async fn prune_stale(&self, max_idle: Duration) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| {
            if Arc::strong_count(handle) > 1 {
                return true;
            }
            match handle.try_lock() {
                Ok(session) => session.state.is_collecting() || session.idle_for(now) < max_idle,
                Err(_) => true,
            }
        });
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = sessions.len(), "Pruned stale sessions");
        }
        removed
    }
}
