//! Process-lifetime registry of paths that must not be converted again
//!
//! A source that was converted but could not be deleted afterwards would be
//! picked up by every later event and burn a remote job each time. Such paths
//! are recorded here and never removed until the process exits.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Anything that can answer "is this exact path excluded"
pub trait IgnoreSet {
    fn contains_path(&self, path: &Path) -> bool;
}

impl IgnoreSet for HashSet<PathBuf> {
    fn contains_path(&self, path: &Path) -> bool {
        self.contains(path)
    }
}

/// Shared, insert-only set of ignored source paths
#[derive(Debug, Default)]
pub struct IgnoreRegistry {
    paths: Mutex<HashSet<PathBuf>>,
    capacity: Option<usize>,
}

impl IgnoreRegistry {
    /// Create an unbounded registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that stops accepting new paths once `capacity` is reached
    pub fn with_capacity_limit(capacity: Option<usize>) -> Self {
        Self {
            paths: Mutex::new(HashSet::new()),
            capacity,
        }
    }

    /// Record a path. Returns `false` if it was already present or the registry is full.
    pub fn insert(&self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        let mut paths = self.lock();

        if paths.contains(&path) {
            return false;
        }

        if let Some(capacity) = self.capacity {
            if paths.len() >= capacity {
                warn!(
                    "Ignore registry is full ({} paths); {} will not be ignored",
                    capacity,
                    path.display()
                );
                return false;
            }
        }

        debug!("Ignoring {} for the rest of this process", path.display());
        paths.insert(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        // Membership stays valid even if a holder panicked.
        self.paths.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl IgnoreSet for IgnoreRegistry {
    fn contains_path(&self, path: &Path) -> bool {
        self.contains(path)
    }
}
