//! The OS filesystem boundary.
//!
//! Everything the evaluator and the walkers know about a directory comes
//! through [`DirectoryAccess`]: existence, the access-control entries,
//! and the immediate children. Keeping this a trait lets tests substitute
//! an in-memory tree and count probes; production code uses
//! [`OsDirectoryAccess`](os::OsDirectoryAccess).

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::identity::{SecurityId, SubjectKind};
use crate::rights::FileRights;

pub mod os;

/// Whether an access-control entry grants or revokes its rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessEffect {
    Allow,
    Deny,
}

/// One access-control entry of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEntry {
    /// Who the entry applies to.
    pub subject: SecurityId,
    /// Whether `subject` names an account or a group.
    pub subject_kind: SubjectKind,
    /// The raw rights mask as stored in the ACL; may contain composite
    /// bits or the all-ones no-access sentinel.
    pub rights: FileRights,
    pub effect: AccessEffect,
}

impl AccessEntry {
    pub fn new(
        subject: impl Into<SecurityId>,
        subject_kind: SubjectKind,
        rights: FileRights,
        effect: AccessEffect,
    ) -> Self {
        Self {
            subject: subject.into(),
            subject_kind,
            rights,
            effect,
        }
    }
}

/// Failures reading a directory or its metadata, kept distinct because
/// the evaluator treats them differently: `Unauthorized` is cached,
/// `NotFound` and `Io` are transient.
#[derive(Error, Debug)]
pub enum FsProbeError {
    #[error("permission denied")]
    Unauthorized,
    #[error("directory not found")]
    NotFound,
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for FsProbeError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => FsProbeError::Unauthorized,
            io::ErrorKind::NotFound => FsProbeError::NotFound,
            _ => FsProbeError::Io(err),
        }
    }
}

/// Read-only view of a directory tree.
///
/// Implementations must keep the error distinction documented on
/// [`FsProbeError`]; the evaluator's negative cache depends on
/// `Unauthorized` being raised only for genuine permission failures.
pub trait DirectoryAccess {
    /// Whether `dir` currently exists and is a directory.
    fn exists(&self, dir: &Path) -> bool;

    /// The access-control entries of `dir`, in ACL order.
    fn access_entries(&self, dir: &Path) -> Result<Vec<AccessEntry>, FsProbeError>;

    /// Immediate subdirectories of `dir`, in OS-reported order.
    fn subdirectories(&self, dir: &Path) -> Result<Vec<PathBuf>, FsProbeError>;

    /// Immediate regular files of `dir`, in OS-reported order.
    fn files(&self, dir: &Path) -> Result<Vec<PathBuf>, FsProbeError>;
}

impl<T: DirectoryAccess + ?Sized> DirectoryAccess for &T {
    fn exists(&self, dir: &Path) -> bool {
        (**self).exists(dir)
    }

    fn access_entries(&self, dir: &Path) -> Result<Vec<AccessEntry>, FsProbeError> {
        (**self).access_entries(dir)
    }

    fn subdirectories(&self, dir: &Path) -> Result<Vec<PathBuf>, FsProbeError> {
        (**self).subdirectories(dir)
    }

    fn files(&self, dir: &Path) -> Result<Vec<PathBuf>, FsProbeError> {
        (**self).files(dir)
    }
}

impl<T: DirectoryAccess + ?Sized> DirectoryAccess for std::sync::Arc<T> {
    fn exists(&self, dir: &Path) -> bool {
        (**self).exists(dir)
    }

    fn access_entries(&self, dir: &Path) -> Result<Vec<AccessEntry>, FsProbeError> {
        (**self).access_entries(dir)
    }

    fn subdirectories(&self, dir: &Path) -> Result<Vec<PathBuf>, FsProbeError> {
        (**self).subdirectories(dir)
    }

    fn files(&self, dir: &Path) -> Result<Vec<PathBuf>, FsProbeError> {
        (**self).files(dir)
    }
}
