// Public operation surface: ping / push_sync / push_async / pull, composed
// from the session registry and queues. A transport/RPC layer embeds this
// and handles the wire protocol itself.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::envelope::PacketEnvelope;
use crate::error::{RelayError, Result};
use crate::session::{SessionRegistry, SessionState};
use crate::stats::{RelayStats, StatsSnapshot};
use crate::warn_hot_path;

/// Liveness token returned by [`RelayService::ping`].
#[derive(Debug, Clone)]
pub struct Liveness {
    /// Random id minted at service construction; changes on restart.
    pub instance_id: String,
    pub uptime: Duration,
    pub active_sessions: usize,
}

/// The relay service. All state is in-memory; a process restart loses every
/// buffered envelope and session.
///
/// Operations on different sessions never serialize behind one another: the
/// registry lock is held only for lookup, and each queue synchronizes
/// independently.
pub struct RelayService {
    registry: Arc<SessionRegistry>,
    config: RelayConfig,
    stats: Arc<RelayStats>,
    instance_id: String,
    started_at: Instant,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl RelayService {
    /// Start the service and its background reaper. Must be called from
    /// within a tokio runtime; sync embedders go through
    /// [`crate::BlockingRelay`] instead.
    pub fn new(config: RelayConfig) -> Arc<Self> {
        let registry = Arc::new(SessionRegistry::new(config.clone()));
        let stats = Arc::new(RelayStats::default());
        let reaper = tokio::spawn(reap_loop(
            Arc::clone(&registry),
            Arc::clone(&stats),
            config.reap_interval,
            config.idle_session_timeout,
        ));

        let service = Arc::new(Self {
            registry,
            stats,
            instance_id: Uuid::new_v4().to_string(),
            started_at: Instant::now(),
            reaper: Mutex::new(Some(reaper)),
            config,
        });
        info!(
            target: "relay_lifecycle",
            instance_id = %service.instance_id,
            "relay service started"
        );
        service
    }

    /// Health check. No side effects; always succeeds while the process is
    /// serving.
    pub async fn ping(&self) -> Liveness {
        Liveness {
            instance_id: self.instance_id.clone(),
            uptime: self.started_at.elapsed(),
            active_sessions: self.registry.len().await,
        }
    }

    /// Push one payload, waiting for queue space if necessary, and return
    /// the assigned sequence number once the envelope is buffered (not once
    /// consumed).
    ///
    /// With `push_timeout` set to zero the wait is skipped and a full queue
    /// is reported as `QueueFull`.
    pub async fn push_sync(&self, session_id: &str, payload: Bytes) -> Result<u64> {
        let (queue, created) = self.registry.get_or_create(session_id).await?;
        if created {
            self.stats.record_session_created();
        }
        let sequence = if self.config.push_timeout.is_zero() {
            queue.try_enqueue(payload)?
        } else {
            queue.enqueue(payload, self.config.push_timeout).await?
        };
        self.stats.record_pushed();
        Ok(sequence)
    }

    /// Fire-and-forget push. Never waits and never fails: any error is
    /// counted in [`RelayStats`] and logged, not surfaced. Delivery is
    /// best-effort, at-most-once.
    pub async fn push_async(&self, session_id: &str, payload: Bytes) {
        let outcome = match self.registry.get_or_create(session_id).await {
            Ok((queue, created)) => {
                if created {
                    self.stats.record_session_created();
                }
                queue.try_enqueue(payload)
            }
            Err(error) => Err(error),
        };
        match outcome {
            Ok(_) => self.stats.record_pushed(),
            Err(error) => {
                self.stats.record_async_drop(&error);
                warn_hot_path!(
                    session_id = %session_id,
                    %error,
                    "async push dropped"
                );
            }
        }
    }

    /// Drain up to `max_count` envelopes from a session, in FIFO order.
    ///
    /// A consumer polls this until it observes a sentinel envelope or an
    /// empty result from a closed session. Session resolution honors
    /// `pull_creates_session`: when disabled, pulling an unknown session
    /// fails with `SessionNotFound` instead of creating it.
    pub async fn pull(
        &self,
        session_id: &str,
        max_count: usize,
        blocking: bool,
        timeout: Option<Duration>,
    ) -> Result<Vec<PacketEnvelope>> {
        let queue = if self.config.pull_creates_session {
            let (queue, created) = self.registry.get_or_create(session_id).await?;
            if created {
                self.stats.record_session_created();
            }
            queue
        } else {
            if session_id.is_empty() {
                return Err(RelayError::InvalidSessionId);
            }
            self.registry
                .get(session_id)
                .await
                .ok_or_else(|| RelayError::SessionNotFound(session_id.to_string()))?
        };

        let envelopes = if blocking {
            queue
                .drain(max_count, timeout.unwrap_or(self.config.pull_timeout))
                .await?
        } else {
            queue.try_drain(max_count)
        };
        self.stats.record_pulled(envelopes.len());
        Ok(envelopes)
    }

    /// Observed lifecycle state of a session, `None` if absent.
    pub async fn session_state(&self, session_id: &str) -> Option<SessionState> {
        self.registry
            .get(session_id)
            .await
            .map(|queue| queue.state())
    }

    /// Close a session out-of-band. Pending envelopes still drain; further
    /// pushes fail with `QueueClosed`.
    pub async fn close_session(&self, session_id: &str) -> Result<()> {
        let queue = self
            .registry
            .get(session_id)
            .await
            .ok_or_else(|| RelayError::SessionNotFound(session_id.to_string()))?;
        queue.close();
        Ok(())
    }

    /// Stop the reaper and close every session. Blocked callers wake and
    /// observe the closed state.
    pub async fn shutdown(&self) {
        let reaper = self.reaper.lock().unwrap().take();
        if let Some(handle) = reaper {
            handle.abort();
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(_) => debug!(target: "relay_lifecycle", "reaper task stopped"),
                Err(_) => warn!(target: "relay_lifecycle", "reaper task did not stop in time"),
            }
        }
        for session_id in self.registry.session_ids().await {
            if let Some(queue) = self.registry.get(&session_id).await {
                queue.close();
            }
        }
        info!(
            target: "relay_lifecycle",
            instance_id = %self.instance_id,
            "relay service stopped"
        );
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for RelayService {
    fn drop(&mut self) {
        if let Some(handle) = self.reaper.lock().unwrap().take() {
            handle.abort();
        }
    }
}

/// Background maintenance: periodically reap idle and finished sessions.
/// Scheduled work, not an error path.
async fn reap_loop(
    registry: Arc<SessionRegistry>,
    stats: Arc<RelayStats>,
    interval: Duration,
    idle_threshold: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so a freshly started
    // service does not scan an empty map.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let reaped = registry.reap(idle_threshold).await;
        if reaped > 0 {
            stats.record_sessions_reaped(reaped);
            debug!(target: "reaper", reaped, "reap pass complete");
        }
    }
}
