use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use super::domain::UserId;
use super::gateway::ApplicationGateway;
use super::reconciler::ApplicationReconciler;

struct SessionEntry<G> {
    tracker: Arc<ApplicationReconciler<G>>,
    last_used: Instant,
}

/// Owns one reconciler per user. State is created on first use and dropped on reset or
/// once the session sat idle longer than the eviction window.
pub struct TrackerRegistry<G> {
    gateway: Arc<G>,
    sessions: Mutex<HashMap<UserId, SessionEntry<G>>>,
}

impl<G> TrackerRegistry<G>
where
    G: ApplicationGateway + 'static,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    /// Reconciler for `user_id`, initialized empty if none exists yet.
    pub fn session(&self, user_id: &UserId) -> Arc<ApplicationReconciler<G>> {
        self.session_at(user_id, Instant::now())
    }

    pub(crate) fn session_at(
        &self,
        user_id: &UserId,
        now: Instant,
    ) -> Arc<ApplicationReconciler<G>> {
        let mut sessions = self.sessions();
        let entry = sessions.entry(user_id.clone()).or_insert_with(|| {
            debug!(%user_id, "tracker session initialized");
            SessionEntry {
                tracker: Arc::new(ApplicationReconciler::new(
                    user_id.clone(),
                    Arc::clone(&self.gateway),
                )),
                last_used: now,
            }
        });
        entry.last_used = now;
        Arc::clone(&entry.tracker)
    }

    pub fn existing(&self, user_id: &UserId) -> Option<Arc<ApplicationReconciler<G>>> {
        self.sessions()
            .get(user_id)
            .map(|entry| Arc::clone(&entry.tracker))
    }

    /// Drops the user's state. Returns whether a session existed.
    pub fn reset(&self, user_id: &UserId) -> bool {
        match self.sessions().remove(user_id) {
            Some(entry) => {
                entry.tracker.reset();
                true
            }
            None => false,
        }
    }

    /// Drops sessions untouched for longer than `max_idle`, returning how many went.
    /// Backend rows are reloaded on the next request; in-memory listings are lost.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        self.evict_idle_at(max_idle, Instant::now())
    }

    pub(crate) fn evict_idle_at(&self, max_idle: Duration, now: Instant) -> usize {
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|user_id, entry| {
            let keep = now.saturating_duration_since(entry.last_used) <= max_idle;
            if !keep {
                debug!(%user_id, "idle tracker session evicted");
            }
            keep
        });
        before - sessions.len()
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions().len()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<UserId, SessionEntry<G>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
