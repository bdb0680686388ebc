//! Session-addressable packet relay.
//!
//! Producers push opaque payloads into per-session bounded FIFO buffers;
//! consumers pull by session id until they observe a sentinel envelope or an
//! empty drain from a closed session. [`RelayService`] is the operation
//! surface a transport/RPC layer embeds — the wire protocol itself lives
//! outside this crate.
//!
//! Everything is held in memory: a process restart loses all buffered
//! envelopes and sessions.

mod blocking;
mod config;
mod envelope;
mod error;
mod hot_path_macros;
mod logger;
mod runtime;
mod service;
mod session;
mod stats;

#[cfg(test)]
mod tests;

pub use blocking::BlockingRelay;
pub use config::{RelayConfig, SentinelMatcher, DEFAULT_SENTINEL};
pub use envelope::PacketEnvelope;
pub use error::{RelayError, Result};
pub use logger::{initialize_logger, InitializeLoggerError};
pub use runtime::get_runtime;
pub use service::{Liveness, RelayService};
pub use session::{SessionQueue, SessionRegistry, SessionState};
pub use stats::{RelayStats, StatsSnapshot};
