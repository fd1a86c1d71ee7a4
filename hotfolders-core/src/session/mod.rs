//! Watch sessions
//!
//! A [`WatchSession`] binds one watched directory to its notification stream
//! and hands qualifying files to a [`crate::JobOrchestrator`]. The
//! [`SessionRegistry`] owns every session of the process.

pub mod registry;
pub mod watch;

pub use registry::SessionRegistry;
pub use watch::WatchSession;

use crate::monitor::DebouncerConfig;
use crate::orchestrator::Timing;

/// Settings shared by every session of a registry
#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    pub timing: Timing,
    pub debounce: DebouncerConfig,
    /// Upper bound for the shared ignore registry
    pub ignore_capacity: Option<usize>,
}
