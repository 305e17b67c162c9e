pub mod port;
pub mod reap;
pub mod state;

pub use port::{Port, PortProbeResult};
pub use reap::{ReapOutcome, ReapStatus};
pub use state::ProcessHandle;
