//! Event debouncing logic to handle rapid file changes

use crate::monitor::FileChange;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Configuration for the debouncer
#[derive(Debug, Clone)]
pub struct DebouncerConfig {
    /// Quiet period in milliseconds before a change is emitted; 0 disables debouncing
    pub delay_ms: u64,
    /// Maximum number of paths held back at once
    pub max_buffer_size: usize,
}

impl Default for DebouncerConfig {
    fn default() -> Self {
        Self {
            delay_ms: 500,
            max_buffer_size: 1000,
        }
    }
}

/// Debouncer for file system events
///
/// A file being copied into a hot folder produces a create event followed by
/// a burst of modify events. The debouncer holds changes per path and emits
/// only the latest one once the path has been quiet for the configured delay.
pub struct Debouncer {
    config: DebouncerConfig,
    pending: Arc<DashMap<PathBuf, PendingChange>>,
}

struct PendingChange {
    change: FileChange,
    first_seen: Instant,
    last_update: Instant,
    count: usize,
}

impl Debouncer {
    /// Create a new debouncer
    pub fn new(config: DebouncerConfig) -> Self {
        Self {
            config,
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Start the debouncer over `input` and return a receiver for debounced events.
    ///
    /// The background task ends when `cancel` fires or `input` closes; pending
    /// changes are flushed in the latter case.
    pub fn spawn(
        self,
        mut input: mpsc::UnboundedReceiver<FileChange>,
        cancel: CancellationToken,
    ) -> mpsc::UnboundedReceiver<FileChange> {
        let (output_tx, output_rx) = mpsc::unbounded_channel();

        if self.config.delay_ms == 0 {
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        change = input.recv() => match change {
                            Some(change) => {
                                if output_tx.send(change).is_err() {
                                    break;
                                }
                            }
                            None => break,
                        },
                    }
                }
            });
            return output_rx;
        }

        let pending = self.pending.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(50));
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    change = input.recv() => match change {
                        Some(change) => handle_change(change, &pending, &config, &output_tx),
                        None => {
                            flush_all(&pending, &output_tx);
                            break;
                        }
                    },
                    _ = ticker.tick() => {
                        emit_ready_changes(&pending, &output_tx, &config);
                    }
                }
            }
        });

        output_rx
    }
}

/// Handle an incoming change event
fn handle_change(
    change: FileChange,
    pending: &DashMap<PathBuf, PendingChange>,
    config: &DebouncerConfig,
    tx: &mpsc::UnboundedSender<FileChange>,
) {
    let path = change.path.clone();
    let now = Instant::now();

    // Full buffer: release the oldest held change early rather than lose it
    if !pending.contains_key(&path) && pending.len() >= config.max_buffer_size {
        let oldest = pending
            .iter()
            .min_by_key(|entry| entry.value().first_seen)
            .map(|entry| entry.key().clone());
        if let Some(oldest) = oldest {
            if let Some((_, held)) = pending.remove(&oldest) {
                debug!("Debouncer buffer full, emitting {:?} early", oldest);
                let _ = tx.send(held.change);
            }
        }
    }

    pending
        .entry(path.clone())
        .and_modify(|e| {
            e.change = change.clone();
            e.last_update = now;
            e.count += 1;
            trace!("Updated pending change for {:?} (count: {})", path, e.count);
        })
        .or_insert_with(|| {
            trace!("New pending change for {:?}", path);
            PendingChange {
                change,
                first_seen: now,
                last_update: now,
                count: 1,
            }
        });
}

/// Emit changes that have been stable for the configured delay
fn emit_ready_changes(
    pending: &DashMap<PathBuf, PendingChange>,
    tx: &mpsc::UnboundedSender<FileChange>,
    config: &DebouncerConfig,
) {
    let now = Instant::now();
    let delay = Duration::from_millis(config.delay_ms);

    let ready: Vec<PathBuf> = pending
        .iter()
        .filter(|entry| now.duration_since(entry.value().last_update) >= delay)
        .map(|entry| entry.key().clone())
        .collect();

    for path in ready {
        if let Some((_, held)) = pending.remove(&path) {
            debug!("Emitting debounced change for {:?} (aggregated {} events)", path, held.count);
            if let Err(e) = tx.send(held.change) {
                debug!("Failed to send debounced change: {}", e);
            }
        }
    }
}

fn flush_all(pending: &DashMap<PathBuf, PendingChange>, tx: &mpsc::UnboundedSender<FileChange>) {
    let paths: Vec<PathBuf> = pending.iter().map(|entry| entry.key().clone()).collect();
    for path in paths {
        if let Some((_, held)) = pending.remove(&path) {
            let _ = tx.send(held.change);
        }
    }
}
