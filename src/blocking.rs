// Synchronous facade for embedders that are not async: a blocking RPC
// server loop drives the relay through plain method calls while the shared
// runtime runs the async core underneath.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::runtime::Runtime;

use crate::config::RelayConfig;
use crate::envelope::PacketEnvelope;
use crate::error::Result;
use crate::runtime::get_runtime;
use crate::service::{Liveness, RelayService};
use crate::session::SessionState;

pub struct BlockingRelay {
    service: Arc<RelayService>,
    runtime: Arc<Runtime>,
}

impl BlockingRelay {
    pub fn new(config: RelayConfig) -> Self {
        let runtime = get_runtime();
        // RelayService::new spawns the reaper, so enter the runtime first.
        let service = {
            let _guard = runtime.enter();
            RelayService::new(config)
        };
        Self { service, runtime }
    }

    pub fn ping(&self) -> Liveness {
        self.runtime.block_on(self.service.ping())
    }

    pub fn push_sync(&self, session_id: &str, payload: Bytes) -> Result<u64> {
        self.runtime
            .block_on(self.service.push_sync(session_id, payload))
    }

    pub fn push_async(&self, session_id: &str, payload: Bytes) {
        self.runtime
            .block_on(self.service.push_async(session_id, payload));
    }

    pub fn pull(
        &self,
        session_id: &str,
        max_count: usize,
        blocking: bool,
        timeout: Option<Duration>,
    ) -> Result<Vec<PacketEnvelope>> {
        self.runtime
            .block_on(self.service.pull(session_id, max_count, blocking, timeout))
    }

    pub fn session_state(&self, session_id: &str) -> Option<SessionState> {
        self.runtime.block_on(self.service.session_state(session_id))
    }

    pub fn close_session(&self, session_id: &str) -> Result<()> {
        self.runtime.block_on(self.service.close_session(session_id))
    }

    pub fn shutdown(&self) {
        self.runtime.block_on(self.service.shutdown());
    }

    /// The wrapped async service, for embedders mixing sync and async call
    /// sites.
    pub fn service(&self) -> &Arc<RelayService> {
        &self.service
    }
}
