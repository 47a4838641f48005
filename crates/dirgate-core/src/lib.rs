//! Access-pruned directory traversal and lock-wait coordination.
//!
//! Three concerns, layered:
//!
//! 1. **Rights and evaluation** — [`FileRights`] masks with
//!    composite-bit expansion, and [`AccessEvaluator`], which decides
//!    whether an [`Identity`] holds a requested rights mask on a
//!    directory by aggregating its access-control entries
//!    (deny-over-allow, direct and group-broad tracks, negative caching
//!    of directories whose ACL cannot even be read).
//! 2. **Traversal** — eager, lazy and cancellable-async enumeration of
//!    the subtree reachable under a rights mask, pruning whole subtrees
//!    at the first denied directory.
//! 3. **Lock waiting** — discovering the processes holding file locks
//!    under a directory and awaiting their exit, optionally raced
//!    against a timeout.
//!
//! The OS is reached only through the [`DirectoryAccess`], `LockProbe`
//! and `ProcessWatch` traits, so all of the above runs unchanged against
//! an in-memory tree in tests. `OsDirectoryAccess` adapts `std::fs`.
//!
//! ```no_run
//! use dirgate_core::{AccessEvaluator, FileRights, Identity, OsDirectoryAccess, SecurityId};
//! use std::path::Path;
//!
//! let me = Identity::new(SecurityId::user(1000), [SecurityId::group(100)]);
//! let eval = AccessEvaluator::new(OsDirectoryAccess::new(), me);
//! for dir in eval.iter_accessible(Path::new("/srv/data"), FileRights::LIST_DIRECTORY) {
//!     println!("{}", dir.display());
//! }
//! ```

pub mod access;
pub mod error;
pub mod fs;
pub mod identity;
pub mod rights;
pub mod walk;

#[cfg(feature = "async")]
pub mod cancel;
#[cfg(feature = "async")]
pub mod lockwait;

pub use access::{AccessError, AccessEvaluator, CacheStats, DeniedDirCache, EvaluatorPolicy};
pub use fs::os::OsDirectoryAccess;
pub use fs::{AccessEffect, AccessEntry, DirectoryAccess, FsProbeError};
pub use identity::{Identity, SecurityId, SubjectKind};
pub use rights::FileRights;
pub use walk::{AccessibleDirs, WalkError};

#[cfg(feature = "async")]
pub use cancel::{CancellationSource, CancellationToken};
#[cfg(feature = "async")]
pub use lockwait::{LockProbe, LockWaitError, LockWaiter, ProcessId, ProcessWatch};
