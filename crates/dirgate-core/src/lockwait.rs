//! Waiting for a directory's locked files to be released.
//!
//! Lock detection for a single file and process-exit detection are OS
//! services supplied through the [`LockProbe`] and [`ProcessWatch`]
//! traits. On top of them [`LockWaiter`] aggregates per-directory: find
//! every lock-held file in the subtree, collect the processes holding
//! those locks, and build one joint wait that resolves when all of them
//! have exited, optionally raced against a timeout.
//!
//! Discovery is a point-in-time snapshot. A process that takes a new
//! lock after discovery is not waited on; callers that need stronger
//! guarantees loop the wait themselves.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use thiserror::Error;
use tracing::{debug, instrument, trace};

use crate::cancel::CancellationToken;
use crate::fs::DirectoryAccess;

/// Identifier of an OS process holding a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

/// Single-file lock introspection, supplied by the platform layer.
pub trait LockProbe {
    /// Whether some process currently holds a lock on `file`.
    fn is_locked(&self, file: &Path) -> bool;

    /// The processes holding locks on `file`; empty when unlocked.
    fn locking_processes(&self, file: &Path) -> Vec<ProcessId>;
}

/// Process-exit signals, supplied by the platform layer.
pub trait ProcessWatch {
    /// A future resolving when the process has exited. Must resolve
    /// immediately for a process that is already gone.
    fn wait_exit(&self, pid: ProcessId) -> BoxFuture<'static, ()>;
}

impl<T: LockProbe + ?Sized> LockProbe for &T {
    fn is_locked(&self, file: &Path) -> bool {
        (**self).is_locked(file)
    }

    fn locking_processes(&self, file: &Path) -> Vec<ProcessId> {
        (**self).locking_processes(file)
    }
}

impl<T: LockProbe + ?Sized> LockProbe for std::sync::Arc<T> {
    fn is_locked(&self, file: &Path) -> bool {
        (**self).is_locked(file)
    }

    fn locking_processes(&self, file: &Path) -> Vec<ProcessId> {
        (**self).locking_processes(file)
    }
}

impl<T: ProcessWatch + ?Sized> ProcessWatch for &T {
    fn wait_exit(&self, pid: ProcessId) -> BoxFuture<'static, ()> {
        (**self).wait_exit(pid)
    }
}

impl<T: ProcessWatch + ?Sized> ProcessWatch for std::sync::Arc<T> {
    fn wait_exit(&self, pid: ProcessId) -> BoxFuture<'static, ()> {
        (**self).wait_exit(pid)
    }
}

/// Errors from the lock-wait operations.
#[derive(Error, Debug)]
pub enum LockWaitError {
    #[error("directory not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("wait cancelled")]
    Cancelled,
}

/// Directory-level lock aggregation and waiting.
pub struct LockWaiter<F, L, W> {
    fs: F,
    probe: L,
    watch: W,
}

impl<F, L, W> LockWaiter<F, L, W>
where
    F: DirectoryAccess,
    L: LockProbe,
    W: ProcessWatch,
{
    pub fn new(fs: F, probe: L, watch: W) -> Self {
        Self { fs, probe, watch }
    }

    /// Whether `dir` or any descendant directory contains a lock-held
    /// file.
    ///
    /// # Errors
    ///
    /// [`LockWaitError::NotFound`] when `dir` does not exist.
    #[instrument(level = "debug", skip(self), fields(dir = %dir.display()))]
    pub fn has_locked_descendant(&self, dir: &Path) -> Result<bool, LockWaitError> {
        self.ensure_exists(dir)?;
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            if self
                .files_or_empty(&current)
                .iter()
                .any(|file| self.probe.is_locked(file))
            {
                return Ok(true);
            }
            pending.extend(self.subdirs_or_empty(&current));
        }
        Ok(false)
    }

    /// Every process holding a lock on a file anywhere under `dir`,
    /// deduplicated, in discovery order. A snapshot, not a subscription.
    ///
    /// # Errors
    ///
    /// [`LockWaitError::NotFound`] when `dir` does not exist.
    #[instrument(level = "debug", skip(self), fields(dir = %dir.display()))]
    pub fn locking_processes(&self, dir: &Path) -> Result<Vec<ProcessId>, LockWaitError> {
        self.ensure_exists(dir)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            for file in self.files_or_empty(&current) {
                if !self.probe.is_locked(&file) {
                    continue;
                }
                for pid in self.probe.locking_processes(&file) {
                    if seen.insert(pid) {
                        out.push(pid);
                    }
                }
            }
            pending.extend(self.subdirs_or_empty(&current));
        }
        trace!(count = out.len(), "locking processes discovered");
        Ok(out)
    }

    /// Wait until every process currently locking a file under `dir` has
    /// exited. Returns immediately when nothing is locked.
    ///
    /// # Errors
    ///
    /// [`LockWaitError::NotFound`] when `dir` does not exist;
    /// [`LockWaitError::Cancelled`] when `cancel` fires first.
    pub async fn wait_unlocked(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), LockWaitError> {
        if cancel.is_cancelled() {
            return Err(LockWaitError::Cancelled);
        }
        let joint = self.joint_wait(dir)?;
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(LockWaitError::Cancelled),
            () = joint => Ok(()),
        }
    }

    /// [`wait_unlocked`](Self::wait_unlocked) raced against a timeout.
    /// `Ok(true)` when all lockers exited before the timeout elapsed.
    ///
    /// # Errors
    ///
    /// [`LockWaitError::NotFound`] when `dir` does not exist;
    /// [`LockWaitError::Cancelled`] when `cancel` fires first.
    pub async fn wait_unlocked_timeout(
        &self,
        dir: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<bool, LockWaitError> {
        if cancel.is_cancelled() {
            return Err(LockWaitError::Cancelled);
        }
        let joint = self.joint_wait(dir)?;
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(LockWaitError::Cancelled),
            () = joint => Ok(true),
            () = tokio::time::sleep(timeout) => {
                debug!(dir = %dir.display(), ?timeout, "lock wait timed out");
                Ok(false)
            }
        }
    }

    /// One future per locking process, joined: resolves when every
    /// process discovered at call time has exited.
    fn joint_wait(
        &self,
        dir: &Path,
    ) -> Result<impl std::future::Future<Output = ()> + use<F, L, W>, LockWaitError> {
        let pids = self.locking_processes(dir)?;
        debug!(dir = %dir.display(), lockers = pids.len(), "building joint wait");
        let waits: Vec<_> = pids.into_iter().map(|pid| self.watch.wait_exit(pid)).collect();
        Ok(async move {
            join_all(waits).await;
        })
    }

    fn ensure_exists(&self, dir: &Path) -> Result<(), LockWaitError> {
        if self.fs.exists(dir) {
            Ok(())
        } else {
            Err(LockWaitError::NotFound {
                path: dir.to_path_buf(),
            })
        }
    }

    /// Listing failures (unauthorized, vanished, transient) read as
    /// empty; a subtree we cannot enumerate holds no locks we can wait
    /// on.
    fn files_or_empty(&self, dir: &Path) -> Vec<PathBuf> {
        self.fs.files(dir).unwrap_or_default()
    }

    fn subdirs_or_empty(&self, dir: &Path) -> Vec<PathBuf> {
        self.fs.subdirectories(dir).unwrap_or_default()
    }
}
