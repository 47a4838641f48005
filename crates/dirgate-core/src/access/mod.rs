//! Access-control evaluation for directories.
//!
//! [`AccessEvaluator`] answers one question: does an identity hold a
//! requested combination of rights on a directory? The answer is built
//! from the directory's access-control entries, evaluated on two
//! independent tracks that are OR-combined:
//!
//! - the **direct track**, where account subjects must equal the
//!   principal and group subjects must be one of its memberships, and
//!   entry rights are compared after composite-bit expansion;
//! - the **server track**, a heuristic for network shares where SID-type
//!   discrimination is unreliable: any subject among the identity's
//!   groups qualifies, compared on the raw rights mask.
//!
//! Within a track a single Deny entry overrides any number of Allows.
//! A final heuristic applies to `LIST_DIRECTORY` requests only: if an
//! actual child listing succeeds, access is granted regardless of what
//! the ACL said. Both heuristics are policy-switchable via
//! [`EvaluatorPolicy`].
//!
//! Permission failures never escalate past the returned `bool`; the only
//! error is a missing directory at the entry point.

pub mod cache;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

use crate::fs::{AccessEffect, AccessEntry, DirectoryAccess, FsProbeError};
use crate::identity::Identity;
use crate::rights::FileRights;

pub use cache::{CacheStats, DeniedDirCache};

/// Errors from [`AccessEvaluator::can_access`] and friends.
///
/// Lack of access is a `false` result, never an error.
#[derive(Error, Debug)]
pub enum AccessError {
    #[error("directory not found: {}", path.display())]
    NotFound { path: PathBuf },
}

/// Switches for the two evaluation heuristics layered on top of the
/// primary ACL evaluation. Both default to on, matching the behavior
/// observed on network shares where ACL metadata is unreliable.
#[derive(Debug, Clone, Copy)]
pub struct EvaluatorPolicy {
    /// Evaluate the group-broad "server" track.
    pub server_track: bool,
    /// Probe an actual child listing for `LIST_DIRECTORY` requests.
    pub listing_probe: bool,
}

impl Default for EvaluatorPolicy {
    fn default() -> Self {
        Self {
            server_track: true,
            listing_probe: true,
        }
    }
}

/// Evaluates directory access rights for a fixed identity.
///
/// The evaluator owns (or shares) a [`DeniedDirCache`]: directories whose
/// ACL cannot be read for lack of permission are remembered and denied
/// without further I/O on subsequent checks. Construct with
/// [`with_cache`](Self::with_cache) to share a cache between evaluators,
/// or with [`new`](Self::new) for a fresh one.
#[derive(Debug)]
pub struct AccessEvaluator<F> {
    fs: F,
    identity: Identity,
    denied: Arc<DeniedDirCache>,
    policy: EvaluatorPolicy,
}

impl<F: DirectoryAccess> AccessEvaluator<F> {
    /// Create an evaluator with a fresh negative cache and default policy.
    pub fn new(fs: F, identity: Identity) -> Self {
        Self::with_cache(fs, identity, Arc::new(DeniedDirCache::new()))
    }

    /// Create an evaluator sharing an existing negative cache.
    pub fn with_cache(fs: F, identity: Identity, denied: Arc<DeniedDirCache>) -> Self {
        Self {
            fs,
            identity,
            denied,
            policy: EvaluatorPolicy::default(),
        }
    }

    /// Replace the heuristic policy.
    #[must_use]
    pub fn with_policy(mut self, policy: EvaluatorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The identity every single-argument check evaluates against.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The shared negative cache.
    pub fn denied_cache(&self) -> &Arc<DeniedDirCache> {
        &self.denied
    }

    pub(crate) fn boundary(&self) -> &F {
        &self.fs
    }

    /// Whether the evaluator's identity holds `rights` on `dir`.
    ///
    /// # Errors
    ///
    /// [`AccessError::NotFound`] when `dir` does not exist. Every other
    /// OS-level failure maps to `Ok(false)`.
    pub fn can_access(&self, dir: &Path, rights: FileRights) -> Result<bool, AccessError> {
        self.can_access_as(dir, &self.identity, rights)
    }

    /// [`can_access`](Self::can_access) with the default `MODIFY` mask.
    pub fn can_modify(&self, dir: &Path) -> Result<bool, AccessError> {
        self.can_access(dir, FileRights::MODIFY)
    }

    /// Whether the directory may be enumerated at all.
    pub fn can_list(&self, dir: &Path) -> Result<bool, AccessError> {
        self.can_access(dir, FileRights::LIST_DIRECTORY)
    }

    /// Whether an arbitrary `identity` holds `rights` on `dir`.
    #[instrument(level = "trace", skip(self, identity), fields(dir = %dir.display()))]
    pub fn can_access_as(
        &self,
        dir: &Path,
        identity: &Identity,
        rights: FileRights,
    ) -> Result<bool, AccessError> {
        if !self.fs.exists(dir) {
            return Err(AccessError::NotFound {
                path: dir.to_path_buf(),
            });
        }

        if self.denied.is_denied(dir) {
            trace!(dir = %dir.display(), "negative cache hit");
            return Ok(false);
        }

        let entries = match self.fs.access_entries(dir) {
            Ok(entries) => entries,
            Err(FsProbeError::Unauthorized) => {
                warn!(dir = %dir.display(), "no permission to read ACL, caching denial");
                self.denied.mark_denied(dir);
                return Ok(false);
            }
            Err(FsProbeError::NotFound) => {
                // Vanished between the existence check and the ACL read.
                debug!(dir = %dir.display(), "directory vanished during ACL read");
                return Ok(false);
            }
            Err(FsProbeError::Io(err)) => {
                warn!(dir = %dir.display(), error = %err, "transient error reading ACL");
                return Ok(false);
            }
        };

        let direct = track_result(entries.iter().filter(|entry| {
            qualifies(entry, rights, |e| e.rights.normalize())
                && identity.matches_subject(&entry.subject, entry.subject_kind)
        }));

        let server = self.policy.server_track
            && track_result(entries.iter().filter(|entry| {
                qualifies(entry, rights, |e| e.rights) && identity.is_member_of(&entry.subject)
            }));

        let probed = !direct && !server && self.listing_probe(dir, rights);

        trace!(direct, server, probed, "access evaluated");
        Ok(direct || server || probed)
    }

    /// Last-resort check for `LIST_DIRECTORY` requests: if enumerating
    /// the children actually works, the ACL verdict is overridden. Covers
    /// filesystems whose ACL metadata is absent or unreliable.
    fn listing_probe(&self, dir: &Path, rights: FileRights) -> bool {
        if !self.policy.listing_probe || rights != FileRights::LIST_DIRECTORY {
            return false;
        }
        match self.fs.subdirectories(dir) {
            Ok(_) => true,
            Err(err) => {
                debug!(dir = %dir.display(), error = %err, "listing probe failed");
                false
            }
        }
    }

    /// Mid-traversal check: any failure, including a vanished directory,
    /// reads as "no access".
    pub(crate) fn allows(&self, dir: &Path, rights: FileRights) -> bool {
        self.can_access(dir, rights).unwrap_or(false)
    }
}

/// Whether an entry's rights mask qualifies it for a track: the mask
/// (viewed through `lens`) must be a superset of the request, and the raw
/// value must not be the no-access sentinel.
fn qualifies(
    entry: &AccessEntry,
    rights: FileRights,
    lens: impl Fn(&AccessEntry) -> FileRights,
) -> bool {
    !entry.rights.is_no_access_sentinel() && lens(entry).contains(rights)
}

/// Aggregate qualifying entries: allowed if at least one Allow is present
/// and no Deny is. Deny always wins within a track.
fn track_result<'a>(entries: impl Iterator<Item = &'a AccessEntry>) -> bool {
    let mut allow = false;
    let mut deny = false;
    for entry in entries {
        match entry.effect {
            AccessEffect::Allow => allow = true,
            AccessEffect::Deny => deny = true,
        }
    }
    allow && !deny
}
