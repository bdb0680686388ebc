use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

/// One buffered packet: the opaque payload plus the metadata the queue
/// assigned when it was admitted.
///
/// Envelopes are immutable once constructed. Within a session, `sequence`
/// is unique and assigned in admission order; a single consumer stream
/// observes envelopes in non-decreasing sequence order. Cross-session
/// ordering is unspecified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketEnvelope {
    session_id: Arc<str>,
    sequence: u64,
    payload: Bytes,
    enqueued_at_ms: u64,
}

impl PacketEnvelope {
    /// Only the owning queue constructs envelopes; the session id and
    /// payload size have been validated by the time this runs.
    pub(crate) fn new(session_id: Arc<str>, sequence: u64, payload: Bytes) -> Self {
        Self {
            session_id,
            sequence,
            payload,
            enqueued_at_ms: now_ms(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consume the envelope, keeping only the payload bytes.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Wall-clock admission time, milliseconds since the Unix epoch.
    pub fn enqueued_at_ms(&self) -> u64 {
        self.enqueued_at_ms
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
