//! The set of active watch sessions

use super::{SessionSettings, WatchSession};
use crate::client::ConversionClient;
use crate::config::WatchConfig;
use crate::error::{ConfigError, SessionError};
use crate::ignore_registry::IgnoreRegistry;
use crate::naming::NameResolver;
use crate::orchestrator::JobOrchestrator;
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Every session of the process, created together and shut down together
pub struct SessionRegistry {
    sessions: Vec<WatchSession>,
    ignored: Arc<IgnoreRegistry>,
}

impl SessionRegistry {
    /// Start one session per watch.
    ///
    /// Every directory is checked before the first session starts; if any
    /// session fails to start, those already running are shut down again.
    pub async fn start(
        watches: Vec<WatchConfig>,
        client: Arc<dyn ConversionClient>,
        settings: &SessionSettings,
    ) -> Result<Self, SessionError> {
        if let Some(missing) = watches.iter().find(|watch| !watch.path.is_dir()) {
            return Err(ConfigError::missing_directory(&missing.path).into());
        }

        let ignored = Arc::new(IgnoreRegistry::with_capacity_limit(settings.ignore_capacity));
        let names = Arc::new(NameResolver::new());
        let mut sessions = Vec::with_capacity(watches.len());

        for watch in watches {
            let orchestrator =
                JobOrchestrator::new(client.clone(), Arc::new(watch), ignored.clone())
                    .with_timing(settings.timing)
                    .with_names(names.clone());

            match WatchSession::start(Arc::new(orchestrator), settings.debounce.clone()) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    warn!("Startup failed, stopping {} started sessions", sessions.len());
                    join_all(sessions.into_iter().map(WatchSession::shutdown)).await;
                    return Err(e);
                }
            }
        }

        info!("Monitoring {} directories", sessions.len());
        Ok(Self { sessions, ignored })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.sessions.iter().map(WatchSession::path)
    }

    /// The ignore registry shared by every session
    pub fn ignored(&self) -> &Arc<IgnoreRegistry> {
        &self.ignored
    }

    /// Tear down every session
    pub async fn shutdown(self) {
        info!("Shutting down {} sessions", self.sessions.len());
        join_all(self.sessions.into_iter().map(WatchSession::shutdown)).await;
    }
}
