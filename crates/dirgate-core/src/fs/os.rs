//! `std::fs`-backed [`DirectoryAccess`] implementation.
//!
//! Listing is portable. Access-control entries are synthesized from the
//! POSIX permission bits on Unix (owner, group and world become three
//! Allow entries); on other platforms no entries are reported and
//! evaluation falls back to the listing probe. Errors are classified
//! through the [`FsProbeError`] `From<io::Error>` mapping, so a
//! `PermissionDenied` while reading metadata surfaces as `Unauthorized`
//! and feeds the negative cache.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::trace;

use super::{AccessEntry, DirectoryAccess, FsProbeError};

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsDirectoryAccess;

impl OsDirectoryAccess {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn list(dir: &Path, want_dirs: bool) -> Result<Vec<PathBuf>, FsProbeError> {
        let mut out = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() == want_dirs {
                out.push(entry.path());
            }
        }
        trace!(dir = %dir.display(), count = out.len(), dirs = want_dirs, "listed directory");
        Ok(out)
    }
}

impl DirectoryAccess for OsDirectoryAccess {
    fn exists(&self, dir: &Path) -> bool {
        dir.is_dir()
    }

    fn access_entries(&self, dir: &Path) -> Result<Vec<AccessEntry>, FsProbeError> {
        let metadata = fs::metadata(dir)?;
        Ok(entries_from_metadata(&metadata))
    }

    fn subdirectories(&self, dir: &Path) -> Result<Vec<PathBuf>, FsProbeError> {
        Self::list(dir, true)
    }

    fn files(&self, dir: &Path) -> Result<Vec<PathBuf>, FsProbeError> {
        Self::list(dir, false)
    }
}

#[cfg(unix)]
fn entries_from_metadata(metadata: &fs::Metadata) -> Vec<AccessEntry> {
    use std::os::unix::fs::MetadataExt;

    use crate::identity::{SecurityId, SubjectKind};

    let mode = metadata.mode();
    vec![
        AccessEntry::new(
            SecurityId::user(metadata.uid()),
            SubjectKind::Account,
            rights_from_mode_triple(mode >> 6),
            super::AccessEffect::Allow,
        ),
        AccessEntry::new(
            SecurityId::group(metadata.gid()),
            SubjectKind::Group,
            rights_from_mode_triple(mode >> 3),
            super::AccessEffect::Allow,
        ),
        AccessEntry::new(
            SecurityId::everyone(),
            SubjectKind::Group,
            rights_from_mode_triple(mode),
            super::AccessEffect::Allow,
        ),
    ]
}

#[cfg(not(unix))]
fn entries_from_metadata(_metadata: &fs::Metadata) -> Vec<AccessEntry> {
    Vec::new()
}

/// Map one `rwx` triple (already shifted into the low three bits) onto
/// the rights bundles the evaluator compares against.
#[cfg(unix)]
fn rights_from_mode_triple(bits: u32) -> crate::rights::FileRights {
    use crate::rights::FileRights;

    let mut rights = FileRights::empty();
    if bits & 0o4 != 0 {
        rights |= FileRights::READ;
    }
    if bits & 0o2 != 0 {
        rights |= FileRights::WRITE | FileRights::DELETE;
    }
    if bits & 0o1 != 0 {
        rights |= FileRights::EXECUTE_FILE
            | FileRights::READ_PERMISSIONS
            | FileRights::READ_ATTRIBUTES
            | FileRights::SYNCHRONIZE;
    }
    rights
}
