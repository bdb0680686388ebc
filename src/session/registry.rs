use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::queue::SessionQueue;
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};

/// Owns the session-id to queue mapping.
///
/// At most one queue exists per id at any time. Lookup and creation are
/// atomic with respect to concurrent callers; cross-session operations
/// never touch more than one queue at a time.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<SessionQueue>>>,
    config: RelayConfig,
}

impl SessionRegistry {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Look up a session, creating it if absent. The boolean reports
    /// whether this call created the queue. Exactly one queue is created
    /// per id even under concurrent first access.
    pub async fn get_or_create(&self, session_id: &str) -> Result<(Arc<SessionQueue>, bool)> {
        if session_id.is_empty() {
            return Err(RelayError::InvalidSessionId);
        }

        // Fast path: the session already exists.
        {
            let sessions = self.sessions.read().await;
            if let Some(queue) = sessions.get(session_id) {
                return Ok((Arc::clone(queue), false));
            }
        }

        let mut sessions = self.sessions.write().await;
        // Re-check: another caller may have created the session while we
        // waited for the write lock.
        if let Some(queue) = sessions.get(session_id) {
            return Ok((Arc::clone(queue), false));
        }
        let queue = Arc::new(SessionQueue::new(Arc::from(session_id), &self.config));
        sessions.insert(session_id.to_string(), Arc::clone(&queue));
        debug!(target: "session_lifecycle", session_id = %session_id, "session created");
        Ok((queue, true))
    }

    /// Non-creating lookup.
    pub async fn get(&self, session_id: &str) -> Option<Arc<SessionQueue>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn session_ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Remove a session, closing its queue. Returns the removed queue so a
    /// caller still draining through its own Arc keeps working.
    pub async fn remove(&self, session_id: &str) -> Option<Arc<SessionQueue>> {
        let removed = self.sessions.write().await.remove(session_id);
        if let Some(queue) = &removed {
            queue.close();
            debug!(target: "session_lifecycle", session_id = %session_id, "session removed");
        }
        removed
    }

    /// One maintenance pass: remove sessions idle past `idle_threshold`
    /// and sessions that are closed and fully drained. Returns how many
    /// were removed.
    ///
    /// Reaping an idle session discards its unread envelopes; an idle
    /// timeout means the stream was abandoned.
    pub async fn reap(&self, idle_threshold: Duration) -> usize {
        // Scan under the read lock, mutate under the write lock.
        let candidates: Vec<String> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .filter(|(_, queue)| queue.is_finished() || queue.idle_for() >= idle_threshold)
                .map(|(id, _)| id.clone())
                .collect()
        };
        if candidates.is_empty() {
            return 0;
        }

        let mut reaped = 0;
        let mut sessions = self.sessions.write().await;
        for session_id in candidates {
            // Re-check under the write lock: a session touched or
            // re-created after the scan must survive this pass.
            let still_due = sessions
                .get(&session_id)
                .is_some_and(|queue| queue.is_finished() || queue.idle_for() >= idle_threshold);
            if !still_due {
                continue;
            }
            if let Some(queue) = sessions.remove(&session_id) {
                let unread = queue.len();
                queue.close();
                if unread > 0 {
                    warn!(
                        target: "reaper",
                        session_id = %session_id,
                        unread,
                        "idle session reaped; unread envelopes discarded"
                    );
                } else {
                    debug!(target: "reaper", session_id = %session_id, "session reaped");
                }
                reaped += 1;
            }
        }
        reaped
    }
}
