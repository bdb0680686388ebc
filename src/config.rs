use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

/// Marker payload the default sentinel matcher looks for. A producer sends
/// this as its final packet to close the session in-band.
pub const DEFAULT_SENTINEL: &[u8] = b"FilterTimeout";

/// Predicate that decides whether a payload terminates its session.
///
/// Matching a sentinel closes the queue after that envelope is buffered, so
/// the consumer still drains the marker and can stop polling on it.
#[derive(Clone)]
pub struct SentinelMatcher(Option<Arc<dyn Fn(&[u8]) -> bool + Send + Sync>>);

impl SentinelMatcher {
    /// Match exactly one marker payload.
    pub fn exact(marker: impl Into<Vec<u8>>) -> Self {
        let marker = marker.into();
        Self(Some(Arc::new(move |payload: &[u8]| payload == marker.as_slice())))
    }

    /// Match with an arbitrary predicate.
    pub fn custom(predicate: impl Fn(&[u8]) -> bool + Send + Sync + 'static) -> Self {
        Self(Some(Arc::new(predicate)))
    }

    /// Never match; sessions close only explicitly or via idle reaping.
    pub fn disabled() -> Self {
        Self(None)
    }

    pub fn matches(&self, payload: &[u8]) -> bool {
        self.0.as_ref().is_some_and(|predicate| predicate(payload))
    }
}

impl Default for SentinelMatcher {
    fn default() -> Self {
        Self::exact(DEFAULT_SENTINEL)
    }
}

impl fmt::Debug for SentinelMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self.0 {
            Some(_) => "SentinelMatcher(enabled)",
            None => "SentinelMatcher(disabled)",
        })
    }
}

/// Relay tuning knobs, shared by every session the service creates.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Buffered envelopes per session before producers see backpressure.
    pub queue_capacity: usize,
    /// Upper bound on a single payload, in bytes.
    pub max_payload_size: usize,
    /// Sessions with no admitted enqueue/drain for this long are reaped.
    pub idle_session_timeout: Duration,
    /// Period of the background reap pass.
    pub reap_interval: Duration,
    /// Whether `pull` on an unknown session creates it (mirroring push) or
    /// fails with `SessionNotFound`.
    pub pull_creates_session: bool,
    /// How long a synchronous push may wait for queue space.
    /// `Duration::ZERO` selects fail-fast semantics: a full queue is
    /// reported as `QueueFull` instead of suspending.
    pub push_timeout: Duration,
    /// Default deadline for a blocking pull that passes no explicit timeout.
    pub pull_timeout: Duration,
    /// End-of-stream detection, applied to every admitted payload.
    pub sentinel: SentinelMatcher,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_payload_size: 1024 * 1024,
            idle_session_timeout: Duration::from_secs(300),
            reap_interval: Duration::from_secs(30),
            pull_creates_session: true,
            push_timeout: Duration::from_secs(15),
            pull_timeout: Duration::from_secs(15),
            sentinel: SentinelMatcher::default(),
        }
    }
}

impl RelayConfig {
    /// Build a config from a transport-supplied settings map.
    ///
    /// Unknown keys are ignored; values of the wrong shape fall back to the
    /// default with a logged warning. Durations are given in whole seconds
    /// under `*_secs` keys. `sentinel` takes a string payload to match
    /// exactly, or `false` to disable sentinel detection.
    pub fn from_settings(settings: &HashMap<String, serde_json::Value>) -> Self {
        let mut config = Self::default();

        if let Some(value) = settings.get("queue_capacity") {
            match value.as_u64() {
                Some(capacity) if capacity > 0 => config.queue_capacity = capacity as usize,
                _ => warn!("Ignoring invalid queue_capacity setting: {}", value),
            }
        }
        if let Some(value) = settings.get("max_payload_size") {
            match value.as_u64() {
                Some(size) => config.max_payload_size = size as usize,
                None => warn!("Ignoring invalid max_payload_size setting: {}", value),
            }
        }
        if let Some(value) = settings.get("idle_session_timeout_secs") {
            match value.as_u64() {
                Some(secs) => config.idle_session_timeout = Duration::from_secs(secs),
                None => warn!("Ignoring invalid idle_session_timeout_secs setting: {}", value),
            }
        }
        if let Some(value) = settings.get("reap_interval_secs") {
            match value.as_u64() {
                Some(secs) if secs > 0 => config.reap_interval = Duration::from_secs(secs),
                _ => warn!("Ignoring invalid reap_interval_secs setting: {}", value),
            }
        }
        if let Some(value) = settings.get("push_timeout_secs") {
            match value.as_u64() {
                Some(secs) => config.push_timeout = Duration::from_secs(secs),
                None => warn!("Ignoring invalid push_timeout_secs setting: {}", value),
            }
        }
        if let Some(value) = settings.get("pull_timeout_secs") {
            match value.as_u64() {
                Some(secs) => config.pull_timeout = Duration::from_secs(secs),
                None => warn!("Ignoring invalid pull_timeout_secs setting: {}", value),
            }
        }
        config.pull_creates_session = settings
            .get("pull_creates_session")
            .map_or(config.pull_creates_session, |v| {
                v.as_bool().unwrap_or(config.pull_creates_session)
            });
        if let Some(value) = settings.get("sentinel") {
            if let Some(marker) = value.as_str() {
                config.sentinel = SentinelMatcher::exact(marker.as_bytes().to_vec());
            } else if value.as_bool() == Some(false) {
                config.sentinel = SentinelMatcher::disabled();
            } else {
                warn!("Ignoring invalid sentinel setting: {}", value);
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_sentinel_matches_marker_only() {
        let sentinel = SentinelMatcher::default();
        assert!(sentinel.matches(DEFAULT_SENTINEL));
        assert!(!sentinel.matches(b"ordinary payload"));
        assert!(!sentinel.matches(b""));
    }

    #[test]
    fn disabled_sentinel_never_matches() {
        let sentinel = SentinelMatcher::disabled();
        assert!(!sentinel.matches(DEFAULT_SENTINEL));
    }

    #[test]
    fn custom_sentinel_uses_predicate() {
        let sentinel = SentinelMatcher::custom(|payload| payload.starts_with(b"END"));
        assert!(sentinel.matches(b"END-of-stream"));
        assert!(!sentinel.matches(b"data"));
    }

    #[test]
    fn from_settings_overrides_known_keys() {
        let settings = HashMap::from([
            ("queue_capacity".to_string(), json!(16)),
            ("max_payload_size".to_string(), json!(4096)),
            ("idle_session_timeout_secs".to_string(), json!(60)),
            ("reap_interval_secs".to_string(), json!(5)),
            ("pull_creates_session".to_string(), json!(false)),
            ("push_timeout_secs".to_string(), json!(0)),
            ("sentinel".to_string(), json!("DONE")),
            ("unknown_key".to_string(), json!("ignored")),
        ]);

        let config = RelayConfig::from_settings(&settings);
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.max_payload_size, 4096);
        assert_eq!(config.idle_session_timeout, Duration::from_secs(60));
        assert_eq!(config.reap_interval, Duration::from_secs(5));
        assert!(!config.pull_creates_session);
        assert_eq!(config.push_timeout, Duration::ZERO);
        assert!(config.sentinel.matches(b"DONE"));
        assert!(!config.sentinel.matches(DEFAULT_SENTINEL));
    }

    #[test]
    fn from_settings_rejects_invalid_values() {
        let settings = HashMap::from([
            ("queue_capacity".to_string(), json!(0)),
            ("sentinel".to_string(), json!(42)),
        ]);

        let config = RelayConfig::from_settings(&settings);
        let defaults = RelayConfig::default();
        assert_eq!(config.queue_capacity, defaults.queue_capacity);
        assert!(config.sentinel.matches(DEFAULT_SENTINEL));
    }
}
