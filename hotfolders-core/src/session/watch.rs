//! One watched directory

use crate::error::{ConfigError, SessionError};
use crate::monitor::{Debouncer, DebouncerConfig, FileChange, FileWatcher, WatcherConfig, matcher};
use crate::orchestrator::{ConversionOutcome, JobOrchestrator};
use notify::RecommendedWatcher;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

/// A running watch over one directory
pub struct WatchSession {
    path: PathBuf,
    cancel: CancellationToken,
    listener: Option<JoinHandle<()>>,
    watcher: Option<RecommendedWatcher>,
}

impl WatchSession {
    /// Start watching the orchestrator's directory.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        orchestrator: Arc<JobOrchestrator>,
        debounce: DebouncerConfig,
    ) -> Result<Self, SessionError> {
        let watch = orchestrator.watch();
        let path = watch.path.clone();
        if !path.is_dir() {
            return Err(ConfigError::missing_directory(path).into());
        }

        let config = WatcherConfig {
            path: path.clone(),
            recursive: watch.options.recursive_scan,
        };
        let (watcher, raw) = FileWatcher::new(config)
            .start()
            .map_err(|source| SessionError::Watch {
                path: path.clone(),
                source,
            })?;

        let cancel = CancellationToken::new();
        let events = Debouncer::new(debounce).spawn(raw, cancel.child_token());

        let mut session = Self::with_events(orchestrator, events, cancel);
        session.watcher = Some(watcher);
        info!("Session started for {}", path.display());

        Ok(session)
    }

    /// Run a session over an existing event stream
    pub(crate) fn with_events(
        orchestrator: Arc<JobOrchestrator>,
        events: mpsc::UnboundedReceiver<FileChange>,
        cancel: CancellationToken,
    ) -> Self {
        let path = orchestrator.watch().path.clone();
        let listener = tokio::spawn(listen(orchestrator, events, cancel.clone()));

        Self {
            path,
            cancel,
            listener: Some(listener),
            watcher: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop watching, abort in-flight conversions and wait for the listener
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        self.watcher.take();

        if let Some(listener) = self.listener.take() {
            if let Err(e) = listener.await {
                error!("Listener for {} ended abnormally: {}", self.path.display(), e);
            }
        }
        info!("Session stopped for {}", self.path.display());
    }

    /// Wait for the event stream to end and every dispatched run to finish
    #[cfg(test)]
    pub(crate) async fn finish(mut self) {
        if let Some(listener) = self.listener.take() {
            listener.await.unwrap();
        }
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn listen(
    orchestrator: Arc<JobOrchestrator>,
    mut events: mpsc::UnboundedReceiver<FileChange>,
    cancel: CancellationToken,
) {
    let mut running: JoinSet<ConversionOutcome> = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                if !running.is_empty() {
                    debug!("Aborting {} running conversions", running.len());
                }
                running.shutdown().await;
                return;
            }
            event = events.recv() => match event {
                Some(change) => dispatch(&orchestrator, change, &mut running),
                None => break,
            },
            Some(joined) = running.join_next(), if !running.is_empty() => log_finished(joined),
        }
    }

    // Event stream closed: let running conversions complete unless cancelled
    while !running.is_empty() {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                running.shutdown().await;
                return;
            }
            Some(joined) = running.join_next() => log_finished(joined),
        }
    }
}

fn dispatch(
    orchestrator: &Arc<JobOrchestrator>,
    change: FileChange,
    running: &mut JoinSet<ConversionOutcome>,
) {
    let watch = orchestrator.watch();

    if !matcher::matches(&change.path, &watch.source_formats) {
        trace!("Not a watched format: {}", change.path.display());
        return;
    }
    if orchestrator.is_ignored(&change.path) {
        debug!("Ignoring {}", change.path.display());
        return;
    }

    debug!("{:?}: {}", change.change_type, change.path.display());
    let orchestrator = orchestrator.clone();
    running.spawn(async move { orchestrator.process(&change.path).await });
}

fn log_finished(joined: Result<ConversionOutcome, tokio::task::JoinError>) {
    match joined {
        Ok(outcome) => debug!(
            "Finished {}: {:?} ({} of {} formats delivered)",
            outcome.source.display(),
            outcome.disposition,
            outcome.delivered().count(),
            outcome.results.len()
        ),
        Err(e) if e.is_cancelled() => {}
        Err(e) => error!("Conversion task failed: {}", e),
    }
}
