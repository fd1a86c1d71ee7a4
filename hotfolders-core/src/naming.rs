//! Collision-free destination naming for downloaded artifacts
//!
//! A proposed name that is already taken in the destination directory gets a
//! parenthesised counter before its extension: `report.pdf`, `report(1).pdf`,
//! `report(2).pdf`, ...
//!
//! Resolution only looks at a snapshot of the directory listing, so two
//! resolutions racing on the same directory could pick the same name.
//! [`NameResolver::reserve`] claims the resolved name with an empty
//! placeholder file created exclusively, and the download later replaces that
//! placeholder. The claim itself is serialised per directory within this
//! process; other processes lose the exclusive create and move on to the next
//! counter.

use dashmap::DashMap;
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::sync::Mutex;
use tracing::{trace, warn};

/// Resolve `proposed` against the current listing of `destination_dir`
pub fn resolve(proposed: &str, destination_dir: &Path) -> io::Result<PathBuf> {
    let existing = std::fs::read_dir(destination_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name())
        .collect::<HashSet<OsString>>();

    Ok(destination_dir.join(resolve_against(proposed, &existing)))
}

/// Resolve `proposed` against a snapshot of existing names
pub fn resolve_against(proposed: &str, existing: &HashSet<OsString>) -> String {
    if !existing.contains(OsStr::new(proposed)) {
        return proposed.to_string();
    }

    let (stem, extension) = split_extension(proposed);
    let mut counter: u64 = 1;
    loop {
        let candidate = match extension {
            Some(ext) => format!("{stem}({counter}).{ext}"),
            None => format!("{stem}({counter})"),
        };
        if !existing.contains(OsStr::new(&candidate)) {
            trace!("Resolved {} to {}", proposed, candidate);
            return candidate;
        }
        counter += 1;
    }
}

/// Reduce a remote-suggested name to a single usable file name.
///
/// Falls back to `<source stem>.<target format>` when the suggestion carries
/// no usable final component.
pub fn artifact_file_name(suggested: &str, source: &Path, target_format: &str) -> String {
    let candidate = Path::new(suggested)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.trim().is_empty());

    match candidate {
        Some(name) => name.to_string(),
        None => {
            let stem = source.file_stem().and_then(|s| s.to_str()).unwrap_or("converted");
            format!("{stem}.{target_format}")
        }
    }
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        // A leading dot marks a hidden file, not an extension
        Some(idx) if idx > 0 && idx + 1 < name.len() => {
            (&name[..idx], Some(&name[idx + 1..]))
        }
        _ => (name, None),
    }
}

/// Hands out destination names, one claim per directory at a time
#[derive(Debug, Default)]
pub struct NameResolver {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl NameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `proposed` in `dir` and claim the result with a placeholder
    pub async fn reserve(&self, proposed: &str, dir: &Path) -> io::Result<Reservation> {
        let lock = self.locks.entry(dir.to_path_buf()).or_default().clone();
        let claimed = {
            let _guard = lock.lock().await;
            claim(proposed, dir).await
        };

        drop(lock);
        self.locks.remove_if(dir, |_, lock| Arc::strong_count(lock) == 1);

        claimed.map(|path| Reservation { path, kept: false })
    }
}

async fn claim(proposed: &str, dir: &Path) -> io::Result<PathBuf> {
    loop {
        let path = resolve(proposed, dir)?;
        let created = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;
        match created {
            Ok(_) => return Ok(path),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                trace!("{} was taken after listing, resolving again", path.display());
            }
            Err(e) => return Err(e),
        }
    }
}

/// A destination name held by an empty placeholder file.
///
/// Dropping the reservation removes the placeholder unless [`keep`](Self::keep)
/// was called, so an abandoned or failed download leaves nothing behind.
#[derive(Debug)]
pub struct Reservation {
    path: PathBuf,
    kept: bool,
}

impl Reservation {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file at the reserved path is final; stop guarding it
    pub fn keep(mut self) -> PathBuf {
        self.kept = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Could not remove placeholder {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn listing(names: &[&str]) -> HashSet<OsString> {
        names.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_unused_name_is_kept() {
        assert_eq!(resolve_against("report.pdf", &listing(&["other.pdf"])), "report.pdf");
    }

    #[test]
    fn test_counter_goes_before_extension() {
        let existing = listing(&["report.pdf", "report(1).pdf"]);
        assert_eq!(resolve_against("report.pdf", &existing), "report(2).pdf");
    }

    #[test]
    fn test_names_without_extension() {
        assert_eq!(resolve_against("README", &listing(&["README"])), "README(1)");
        assert_eq!(resolve_against(".profile", &listing(&[".profile"])), ".profile(1)");
    }

    #[test]
    fn test_resolve_reads_directory() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve("report.pdf", dir.path()).unwrap(), dir.path().join("report.pdf"));

        std::fs::write(dir.path().join("report.pdf"), b"x").unwrap();
        assert_eq!(
            resolve("report.pdf", dir.path()).unwrap(),
            dir.path().join("report(1).pdf")
        );
    }

    #[test]
    fn test_resolve_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        assert!(resolve("report.pdf", &dir.path().join("gone")).is_err());
    }

    #[test]
    fn test_artifact_file_name_strips_directories() {
        let source = Path::new("/inbox/report.docx");
        assert_eq!(artifact_file_name("report.pdf", source, "pdf"), "report.pdf");
        assert_eq!(artifact_file_name("../../etc/passwd", source, "pdf"), "passwd");
        assert_eq!(artifact_file_name("..", source, "pdf"), "report.pdf");
        assert_eq!(artifact_file_name("", source, "pdf"), "report.pdf");
    }

    #[tokio::test]
    async fn test_concurrent_reservations_get_distinct_names() {
        let dir = TempDir::new().unwrap();
        let resolver = Arc::new(NameResolver::new());

        let claims = (0..8).map(|_| {
            let resolver = resolver.clone();
            let dir = dir.path().to_path_buf();
            tokio::spawn(async move { resolver.reserve("report.pdf", &dir).await.unwrap() })
        });
        let reservations = futures::future::join_all(claims).await;

        let names: HashSet<PathBuf> = reservations
            .iter()
            .map(|r| r.as_ref().unwrap().path().to_path_buf())
            .collect();
        assert_eq!(names.len(), 8);
        assert!(names.contains(&dir.path().join("report.pdf")));
        assert!(names.contains(&dir.path().join("report(7).pdf")));
        assert!(names.iter().all(|name| name.is_file()));
        assert!(resolver.locks.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_reservation_removes_placeholder() {
        let dir = TempDir::new().unwrap();
        let resolver = NameResolver::new();

        let abandoned = resolver.reserve("report.pdf", dir.path()).await.unwrap();
        let placeholder = abandoned.path().to_path_buf();
        assert!(placeholder.is_file());
        drop(abandoned);
        assert!(!placeholder.exists());

        let kept = resolver.reserve("report.pdf", dir.path()).await.unwrap();
        std::fs::write(kept.path(), b"%PDF").unwrap();
        let path = kept.keep();
        assert_eq!(path, dir.path().join("report.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF");
    }

    #[tokio::test]
    async fn test_reserve_skips_names_taken_on_disk() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("report.pdf"), b"x").unwrap();

        let reservation = NameResolver::new().reserve("report.pdf", dir.path()).await.unwrap();
        assert_eq!(reservation.path(), dir.path().join("report(1).pdf"));
    }

    #[tokio::test]
    async fn test_reserve_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let resolver = NameResolver::new();

        assert!(resolver.reserve("report.pdf", &dir.path().join("gone")).await.is_err());
        assert!(resolver.locks.is_empty());
    }

    proptest! {
        #[test]
        fn prop_unused_name_resolves_to_itself(
            stem in "[a-z]{1,8}",
            others in proptest::collection::vec("[a-z]{1,8}\\.txt", 0..10),
        ) {
            let proposed = format!("{stem}.pdf");
            let existing: HashSet<OsString> = others.iter().map(OsString::from).collect();
            prop_assert_eq!(resolve_against(&proposed, &existing), proposed);
        }

        #[test]
        fn prop_taken_prefix_resolves_to_next_counter(stem in "[a-z]{1,8}", k in 1u64..20) {
            let proposed = format!("{stem}.pdf");
            let mut existing = HashSet::new();
            existing.insert(OsString::from(&proposed));
            for n in 1..k {
                existing.insert(OsString::from(format!("{stem}({n}).pdf")));
            }

            let resolved = resolve_against(&proposed, &existing);
            prop_assert_eq!(&resolved, &format!("{stem}({k}).pdf"));
            prop_assert!(!existing.contains(OsStr::new(&resolved)));
        }

        #[test]
        fn prop_result_never_collides(
            proposed in "[a-z]{1,4}(\\.[a-z]{1,3})?",
            taken in proptest::collection::hash_set("[a-z]{1,4}(\\([0-9]\\))?(\\.[a-z]{1,3})?", 0..40),
        ) {
            let existing: HashSet<OsString> = taken.iter().map(OsString::from).collect();
            let resolved = resolve_against(&proposed, &existing);
            prop_assert!(!existing.contains(OsStr::new(&resolved)));
        }
    }
}
