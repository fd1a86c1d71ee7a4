//! Zip extraction for downloaded artifacts

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use zip::ZipArchive;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to open archive {path}: {source}")]
    Open {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to extract archive {path}: {source}")]
    Extract {
        path: PathBuf,
        source: zip::result::ZipError,
    },

    #[error("Extraction of {path} was interrupted")]
    Interrupted { path: PathBuf },
}

/// Whether a downloaded file should be treated as a zip archive
pub fn is_archive(path: &Path) -> bool {
    path.as_os_str().as_encoded_bytes().ends_with(b".zip")
}

/// Extract every entry of `archive_path` into `dest`, keeping the archive.
///
/// Entries whose names would escape `dest` are rejected by the zip reader.
/// Returns the number of entries in the archive.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    let file = fs::File::open(archive_path).map_err(|source| ArchiveError::Open {
        path: archive_path.to_path_buf(),
        source,
    })?;

    let extract_err = |source: zip::result::ZipError| ArchiveError::Extract {
        path: archive_path.to_path_buf(),
        source,
    };

    let mut archive = ZipArchive::new(file).map_err(extract_err)?;
    let entries = archive.len();
    archive.extract(dest).map_err(extract_err)?;

    debug!(
        "Extracted {} entries from {} into {}",
        entries,
        archive_path.display(),
        dest.display()
    );
    Ok(entries)
}

/// Run [`extract_zip`] on the blocking pool
pub async fn extract_in_background(
    archive_path: PathBuf,
    dest: PathBuf,
) -> Result<usize, ArchiveError> {
    let path = archive_path.clone();
    tokio::task::spawn_blocking(move || extract_zip(&archive_path, &dest))
        .await
        .map_err(|_| ArchiveError::Interrupted { path })?
}
