// Session machinery: per-session bounded queues and the registry that owns
// them.

mod queue;
mod registry;

pub use queue::{SessionQueue, SessionState};
pub use registry::SessionRegistry;
