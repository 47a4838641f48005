//! In-memory fakes for the OS boundary traits.
//!
//! `FakeTree` is a scripted directory tree with per-directory failure
//! injection and counters for the two kinds of OS probes (ACL reads and
//! child listings), so tests can assert not just results but how much
//! I/O it took to get them.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use dirgate_core::{
    AccessEffect, AccessEntry, DirectoryAccess, FileRights, FsProbeError, Identity, SecurityId,
    SubjectKind,
};

/// Scripted behavior of one directory.
#[derive(Debug, Default, Clone)]
pub struct DirSpec {
    pub entries: Vec<AccessEntry>,
    /// Reading the ACL raises `Unauthorized`.
    pub acl_unauthorized: bool,
    /// Reading the ACL raises a transient I/O error.
    pub acl_io_error: bool,
    /// Listing children (dirs or files) raises `Unauthorized`.
    pub list_unauthorized: bool,
    /// File names directly inside this directory.
    pub files: Vec<String>,
}

impl DirSpec {
    pub fn with_entries(entries: Vec<AccessEntry>) -> Self {
        Self {
            entries,
            ..Self::default()
        }
    }
}

/// An in-memory [`DirectoryAccess`] with deterministic (lexicographic)
/// child ordering.
#[derive(Debug, Default)]
pub struct FakeTree {
    dirs: Mutex<BTreeMap<PathBuf, DirSpec>>,
    acl_reads: AtomicUsize,
    listings: AtomicUsize,
}

impl FakeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir(&self, path: impl Into<PathBuf>, spec: DirSpec) {
        self.dirs.lock().unwrap().insert(path.into(), spec);
    }

    pub fn remove_dir(&self, path: &Path) {
        self.dirs.lock().unwrap().remove(path);
    }

    /// ACL reads performed so far.
    pub fn acl_reads(&self) -> usize {
        self.acl_reads.load(Ordering::SeqCst)
    }

    /// Child listings performed so far.
    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    /// Total OS probes performed so far.
    pub fn io_calls(&self) -> usize {
        self.acl_reads() + self.listings()
    }
}

impl DirectoryAccess for FakeTree {
    fn exists(&self, dir: &Path) -> bool {
        self.dirs.lock().unwrap().contains_key(dir)
    }

    fn access_entries(&self, dir: &Path) -> Result<Vec<AccessEntry>, FsProbeError> {
        self.acl_reads.fetch_add(1, Ordering::SeqCst);
        let dirs = self.dirs.lock().unwrap();
        let spec = dirs.get(dir).ok_or(FsProbeError::NotFound)?;
        if spec.acl_unauthorized {
            return Err(FsProbeError::Unauthorized);
        }
        if spec.acl_io_error {
            return Err(FsProbeError::Io(std::io::Error::other("scripted failure")));
        }
        Ok(spec.entries.clone())
    }

    fn subdirectories(&self, dir: &Path) -> Result<Vec<PathBuf>, FsProbeError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        let dirs = self.dirs.lock().unwrap();
        let spec = dirs.get(dir).ok_or(FsProbeError::NotFound)?;
        if spec.list_unauthorized {
            return Err(FsProbeError::Unauthorized);
        }
        Ok(dirs
            .keys()
            .filter(|path| path.parent() == Some(dir))
            .cloned()
            .collect())
    }

    fn files(&self, dir: &Path) -> Result<Vec<PathBuf>, FsProbeError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        let dirs = self.dirs.lock().unwrap();
        let spec = dirs.get(dir).ok_or(FsProbeError::NotFound)?;
        if spec.list_unauthorized {
            return Err(FsProbeError::Unauthorized);
        }
        Ok(spec.files.iter().map(|name| dir.join(name)).collect())
    }
}

pub const PRINCIPAL: &str = "S-1-5-21-1000";
pub const USERS_GROUP: &str = "S-1-5-32-545";
pub const ADMINS_GROUP: &str = "S-1-5-32-544";

/// An identity belonging to [`USERS_GROUP`] and [`ADMINS_GROUP`].
pub fn test_identity() -> Identity {
    Identity::new(
        SecurityId::new(PRINCIPAL),
        [SecurityId::new(USERS_GROUP), SecurityId::new(ADMINS_GROUP)],
    )
}

pub fn allow(subject: &str, kind: SubjectKind, rights: FileRights) -> AccessEntry {
    AccessEntry::new(subject, kind, rights, AccessEffect::Allow)
}

pub fn deny(subject: &str, kind: SubjectKind, rights: FileRights) -> AccessEntry {
    AccessEntry::new(subject, kind, rights, AccessEffect::Deny)
}

/// A directory the test identity can read through the direct track.
pub fn readable() -> DirSpec {
    DirSpec::with_entries(vec![allow(
        PRINCIPAL,
        SubjectKind::Account,
        FileRights::READ,
    )])
}

/// A directory with an ACL that grants the test identity nothing.
pub fn unreadable() -> DirSpec {
    DirSpec::with_entries(vec![allow(
        "S-1-5-21-9999",
        SubjectKind::Account,
        FileRights::FULL_CONTROL,
    )])
}
