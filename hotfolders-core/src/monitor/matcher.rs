//! Source-format matching and ignore filtering
//!
//! Both checks are pure: they only look at the path and the sets handed in.

use crate::ignore_registry::IgnoreSet;
use std::collections::BTreeSet;
use std::path::Path;

/// True iff the path ends with one of the source formats.
///
/// The comparison is an exact, case-sensitive suffix match on the raw path,
/// so `.docx` matches `report.docx` but not `report.DOCX` or `report.docxm`.
pub fn matches(path: &Path, source_formats: &BTreeSet<String>) -> bool {
    let raw = path.as_os_str().as_encoded_bytes();
    source_formats.iter().any(|format| raw.ends_with(format.as_bytes()))
}

/// True iff the path is listed in the watch's static ignore list, or is a
/// member of the dynamic ignore set.
///
/// Static entries are file names resolved against the file's own directory,
/// so under a recursive watch an entry applies in every subdirectory.
pub fn is_ignored<S>(path: &Path, static_ignore: &BTreeSet<String>, dynamic: &S) -> bool
where
    S: IgnoreSet + ?Sized,
{
    let listed = path
        .parent()
        .is_some_and(|dir| static_ignore.iter().any(|entry| dir.join(entry) == path));

    listed || dynamic.contains_path(path)
}
