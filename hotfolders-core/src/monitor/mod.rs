//! Filesystem monitoring and change qualification
//!
//! This module provides the watch side of a hot folder:
//! - A `notify` based watcher emitting create, modify and move events
//! - Event debouncing so a file still being written triggers one conversion
//! - Format matching and ignore-list filtering of changed paths

pub mod debouncer;
pub mod matcher;
pub mod watcher;

pub use debouncer::{Debouncer, DebouncerConfig};
pub use matcher::{is_ignored, matches};
pub use watcher::{FileWatcher, WatcherConfig};

use std::path::PathBuf;

/// Represents a detected filesystem change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub change_type: ChangeType,
}

impl FileChange {
    pub fn new(path: impl Into<PathBuf>, change_type: ChangeType) -> Self {
        Self {
            path: path.into(),
            change_type,
        }
    }
}

/// Types of filesystem changes that can trigger a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Created,
    Modified,
    Moved,
}
