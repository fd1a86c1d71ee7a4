//! Core functionality for hotfolders
//!
//! This crate contains the conversion pipeline behind the `hotfolders` tool:
//! filesystem monitoring, the remote conversion client, the per-file job
//! orchestrator and the watch sessions that tie them together.

pub mod client;
pub mod config;
pub mod error;
pub mod ignore_registry;
pub mod monitor;
pub mod naming;
pub mod orchestrator;
pub mod session;

pub use client::{ConversionClient, ZamzarClient, ZamzarConfig};
pub use config::{HotfoldersConfig, WatchConfig, WatchOptions};
pub use error::{ConfigError, SessionError};
pub use ignore_registry::IgnoreRegistry;
pub use naming::NameResolver;
pub use orchestrator::{ConversionOutcome, JobOrchestrator, SourceDisposition, Timing};
pub use session::{SessionRegistry, SessionSettings, WatchSession};
