//! Core file system watcher implementation using notify crate

use crate::monitor::{ChangeType, FileChange};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

/// Configuration for the file watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub path: PathBuf,
    pub recursive: bool,
}

/// Watches one directory and forwards qualifying changes over a channel
pub struct FileWatcher {
    config: WatcherConfig,
}

impl FileWatcher {
    /// Create a new file watcher
    pub fn new(config: WatcherConfig) -> Self {
        Self { config }
    }

    /// Start watching for file changes.
    ///
    /// Events stop as soon as the returned watcher is dropped, which also
    /// closes the receiver.
    pub fn start(
        self,
    ) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<FileChange>), notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    for change in process_event(event) {
                        if let Err(e) = tx.send(change) {
                            debug!("Dropping change, receiver closed: {}", e);
                        }
                    }
                }
                Err(e) => error!("Watch error: {:?}", e),
            }
        })?;

        let mode = if self.config.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        watcher.watch(&self.config.path, mode)?;
        info!("Watching path: {:?} (recursive: {})", self.config.path, self.config.recursive);

        Ok((watcher, rx))
    }
}

/// Process a notify event into zero or more FileChanges
fn process_event(event: Event) -> Vec<FileChange> {
    let (change_type, paths) = match event.kind {
        EventKind::Create(CreateKind::Folder) => return Vec::new(),
        EventKind::Create(_) => (ChangeType::Created, event.paths),
        // The old name of a renamed file no longer exists
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => return Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            (ChangeType::Moved, event.paths.into_iter().skip(1).collect())
        }
        EventKind::Modify(ModifyKind::Name(_)) => (ChangeType::Moved, event.paths),
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => (ChangeType::Modified, event.paths),
        _ => return Vec::new(),
    };

    paths
        .into_iter()
        .filter(|path| {
            if path.is_dir() {
                trace!("Skipping directory event: {:?}", path);
                false
            } else {
                true
            }
        })
        .map(|path| FileChange::new(path, change_type))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, MetadataKind, RemoveKind};
    use tempfile::TempDir;
    use tokio::time::{Duration, timeout};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn test_process_event_maps_kinds() {
        let created = process_event(event(EventKind::Create(CreateKind::File), &["/w/a.docx"]));
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].change_type, ChangeType::Created);

        let modified = process_event(event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/w/a.docx"],
        ));
        assert_eq!(modified[0].change_type, ChangeType::Modified);

        let removed = process_event(event(EventKind::Remove(RemoveKind::File), &["/w/a.docx"]));
        assert!(removed.is_empty());

        let metadata = process_event(event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            &["/w/a.docx"],
        ));
        assert!(metadata.is_empty());
    }

    #[test]
    fn test_process_event_uses_rename_destination() {
        let both = process_event(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/w/draft.tmp", "/w/final.docx"],
        ));
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].path, PathBuf::from("/w/final.docx"));
        assert_eq!(both[0].change_type, ChangeType::Moved);

        let from = process_event(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/w/draft.docx"],
        ));
        assert!(from.is_empty());

        let to = process_event(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &["/w/final.docx"],
        ));
        assert_eq!(to[0].path, PathBuf::from("/w/final.docx"));
    }

    #[tokio::test]
    async fn test_file_watcher_detects_changes() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("report.docx");

        let config = WatcherConfig {
            path: temp_dir.path().to_path_buf(),
            recursive: false,
        };
        let (_watcher, mut rx) = FileWatcher::new(config).start().unwrap();

        std::fs::write(&test_file, "content").unwrap();

        let change = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(change.path.file_name(), test_file.file_name());
    }
}
