// Per-session bounded FIFO buffer with blocking and non-blocking
// producer/consumer paths.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::Notify;
use tokio::time::timeout_at;
use tracing::{debug, info};

use crate::config::{RelayConfig, SentinelMatcher};
use crate::envelope::PacketEnvelope;
use crate::error::{RelayError, Result};
use crate::{debug_hot_path, trace_hot_path};

/// Lifecycle of a session, observed through `closed` and buffer occupancy.
/// `Active -> Draining -> Closed`; a closed queue never reopens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting enqueues.
    Active,
    /// Closed with envelopes still buffered; drains continue.
    Draining,
    /// Closed and fully drained.
    Closed,
}

struct QueueState {
    buffer: VecDeque<PacketEnvelope>,
    next_sequence: u64,
    closed: bool,
    last_activity: Instant,
}

/// One session's ordered buffer.
///
/// The mutex guards plain state and is never held across an await; blocked
/// producers and consumers park on the two `Notify` handles instead. A
/// blocked caller that is cancelled (its future dropped) releases its wait
/// without touching queue state, so cancellation behaves like a timeout.
pub struct SessionQueue {
    session_id: Arc<str>,
    capacity: usize,
    max_payload_size: usize,
    sentinel: SentinelMatcher,
    state: Mutex<QueueState>,
    /// Signalled when room frees up or the queue closes.
    space_freed: Notify,
    /// Signalled when an envelope lands or the queue closes.
    data_ready: Notify,
}

impl SessionQueue {
    pub(crate) fn new(session_id: Arc<str>, config: &RelayConfig) -> Self {
        Self {
            session_id,
            capacity: config.queue_capacity,
            max_payload_size: config.max_payload_size,
            sentinel: config.sentinel.clone(),
            state: Mutex::new(QueueState {
                buffer: VecDeque::new(),
                next_sequence: 1,
                closed: false,
                last_activity: Instant::now(),
            }),
            space_freed: Notify::new(),
            data_ready: Notify::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Non-blocking enqueue. Fails fast with `QueueFull` when the buffer is
    /// at capacity. A rejected push consumes no sequence number.
    pub fn try_enqueue(&self, payload: Bytes) -> Result<u64> {
        self.check_payload(&payload)?;
        match self.admit(payload)? {
            Some(sequence) => Ok(sequence),
            None => Err(RelayError::QueueFull {
                session_id: self.session_id.to_string(),
            }),
        }
    }

    /// Blocking enqueue. Suspends while the buffer is full, until space
    /// frees, the queue closes (`QueueClosed`), or the deadline passes
    /// (`Timeout`).
    pub async fn enqueue(&self, payload: Bytes, timeout: Duration) -> Result<u64> {
        self.check_payload(&payload)?;
        let deadline = tokio::time::Instant::now() + timeout;
        let space = self.space_freed.notified();
        tokio::pin!(space);
        loop {
            // Register interest before checking state so a wakeup between
            // the check and the await is not lost.
            space.as_mut().enable();
            if let Some(sequence) = self.admit(payload.clone())? {
                return Ok(sequence);
            }
            if timeout_at(deadline, space.as_mut()).await.is_err() {
                return Err(RelayError::Timeout {
                    session_id: self.session_id.to_string(),
                    waited: timeout,
                });
            }
            space.set(self.space_freed.notified());
        }
    }

    /// Non-blocking drain: up to `max_count` oldest envelopes, FIFO. An
    /// empty queue yields an empty vec, never an error.
    pub fn try_drain(&self, max_count: usize) -> Vec<PacketEnvelope> {
        self.take(max_count)
    }

    /// Blocking drain. Suspends until at least one envelope is available,
    /// the queue closes (empty vec), or the deadline passes (`Timeout`).
    pub async fn drain(&self, max_count: usize, timeout: Duration) -> Result<Vec<PacketEnvelope>> {
        if max_count == 0 {
            return Ok(Vec::new());
        }
        let deadline = tokio::time::Instant::now() + timeout;
        let data = self.data_ready.notified();
        tokio::pin!(data);
        loop {
            data.as_mut().enable();
            let drained = self.take(max_count);
            if !drained.is_empty() {
                return Ok(drained);
            }
            if self.is_closed() {
                // Closed and empty: the end of the stream, not a timeout.
                return Ok(Vec::new());
            }
            if timeout_at(deadline, data.as_mut()).await.is_err() {
                return Err(RelayError::Timeout {
                    session_id: self.session_id.to_string(),
                    waited: timeout,
                });
            }
            data.set(self.data_ready.notified());
        }
    }

    /// Idempotent. Marks the queue closed and wakes every suspended
    /// producer and consumer so they observe the closed state.
    pub fn close(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if state.closed {
                return;
            }
            state.closed = true;
            // Give consumers the full idle window to drain what remains.
            state.last_activity = Instant::now();
        }
        debug!(target: "session_lifecycle", session_id = %self.session_id, "queue closed");
        self.space_freed.notify_waiters();
        self.data_ready.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// Buffered envelopes not yet drained.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> SessionState {
        let state = self.state.lock().unwrap();
        match (state.closed, state.buffer.is_empty()) {
            (false, _) => SessionState::Active,
            (true, false) => SessionState::Draining,
            (true, true) => SessionState::Closed,
        }
    }

    /// Time since the last admitted enqueue, drain, or close.
    pub fn idle_for(&self) -> Duration {
        self.state.lock().unwrap().last_activity.elapsed()
    }

    /// Closed and fully drained; safe for the registry to discard.
    pub(crate) fn is_finished(&self) -> bool {
        self.state() == SessionState::Closed
    }

    fn check_payload(&self, payload: &Bytes) -> Result<()> {
        if payload.len() > self.max_payload_size {
            return Err(RelayError::PayloadTooLarge {
                size: payload.len(),
                limit: self.max_payload_size,
            });
        }
        Ok(())
    }

    /// Append under the lock. `Ok(None)` means the buffer is full; the
    /// caller decides whether that is an error or a reason to wait. A
    /// sentinel payload closes the queue after being buffered.
    fn admit(&self, payload: Bytes) -> Result<Option<u64>> {
        let hit_sentinel = self.sentinel.matches(&payload);
        let sequence;
        {
            let mut state = self.state.lock().unwrap();
            if state.closed {
                return Err(RelayError::QueueClosed {
                    session_id: self.session_id.to_string(),
                });
            }
            if state.buffer.len() >= self.capacity {
                return Ok(None);
            }
            sequence = state.next_sequence;
            state.next_sequence += 1;
            state.buffer.push_back(PacketEnvelope::new(
                Arc::clone(&self.session_id),
                sequence,
                payload,
            ));
            state.last_activity = Instant::now();
            if hit_sentinel {
                state.closed = true;
            }
        }
        if hit_sentinel {
            info!(
                target: "session_lifecycle",
                session_id = %self.session_id,
                sequence,
                "Sentinel payload admitted; queue closed"
            );
            // Producers parked on a full buffer must observe the close.
            self.space_freed.notify_waiters();
        }
        trace_hot_path!(session_id = %self.session_id, sequence, "envelope buffered");
        self.data_ready.notify_waiters();
        Ok(Some(sequence))
    }

    /// Remove up to `max_count` envelopes from the front of the buffer.
    fn take(&self, max_count: usize) -> Vec<PacketEnvelope> {
        let drained: Vec<PacketEnvelope> = {
            let mut state = self.state.lock().unwrap();
            let count = max_count.min(state.buffer.len());
            if count > 0 {
                state.last_activity = Instant::now();
            }
            state.buffer.drain(..count).collect()
        };
        if !drained.is_empty() {
            debug_hot_path!(
                session_id = %self.session_id,
                count = drained.len(),
                "envelopes drained"
            );
            self.space_freed.notify_waiters();
        }
        drained
    }
}
