//! Permission-pruned recursive directory enumeration.
//!
//! All three variants share one contract: starting from a root, emit
//! every directory that passes the access check, depth-first and
//! pre-order (a directory before its descendants, siblings in
//! OS-reported order), and never descend into a subtree whose root fails
//! the check. The pruning is an approximation that assumes access grows
//! more restrictive down a tree; a descendant that is independently
//! accessible under a denied ancestor is not found.
//!
//! - [`AccessEvaluator::accessible_subtree`] collects eagerly.
//! - [`AccessEvaluator::iter_accessible`] is lazy and restartable: each
//!   call builds a fresh cursor, and no listing happens beyond what the
//!   consumer pulls.
//! - [`AccessEvaluator::accessible_subtree_async`] yields to the runtime
//!   before each directory expansion and observes a cancellation token.

use std::path::{Path, PathBuf};
use std::vec;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::access::AccessEvaluator;
use crate::fs::DirectoryAccess;
use crate::rights::FileRights;

#[cfg(feature = "async")]
use crate::fs::FsProbeError;
#[cfg(feature = "async")]
use futures::future::BoxFuture;

#[cfg(feature = "async")]
use crate::cancel::CancellationToken;

/// Errors from the traversal entry points.
#[derive(Error, Debug)]
pub enum WalkError {
    #[error("directory not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("traversal cancelled")]
    Cancelled,
}

impl<F: DirectoryAccess> AccessEvaluator<F> {
    /// Eagerly collect the accessible subtree under `root`.
    ///
    /// # Errors
    ///
    /// [`WalkError::NotFound`] when `root` does not exist.
    #[instrument(level = "debug", skip(self), fields(root = %root.display()))]
    pub fn accessible_subtree(
        &self,
        root: &Path,
        rights: FileRights,
    ) -> Result<Vec<PathBuf>, WalkError> {
        if !self.boundary().exists(root) {
            return Err(WalkError::NotFound {
                path: root.to_path_buf(),
            });
        }
        Ok(self.iter_accessible(root, rights).collect())
    }

    /// Lazy counterpart of [`accessible_subtree`](Self::accessible_subtree).
    ///
    /// A non-existent or denied root produces an empty iterator rather
    /// than an error, and no child I/O is attempted for it.
    pub fn iter_accessible(&self, root: &Path, rights: FileRights) -> AccessibleDirs<'_, F> {
        AccessibleDirs {
            eval: self,
            rights,
            stack: vec![vec![root.to_path_buf()].into_iter()],
            to_expand: None,
        }
    }

    /// Async counterpart, suspending before each directory-level
    /// expansion.
    ///
    /// # Errors
    ///
    /// [`WalkError::NotFound`] when `root` does not exist;
    /// [`WalkError::Cancelled`] when `cancel` fires, with no further I/O
    /// performed after the cancellation is observed.
    #[cfg(feature = "async")]
    #[instrument(level = "debug", skip(self, cancel), fields(root = %root.display()))]
    pub async fn accessible_subtree_async(
        &self,
        root: &Path,
        rights: FileRights,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>, WalkError>
    where
        F: Sync,
    {
        if cancel.is_cancelled() {
            return Err(WalkError::Cancelled);
        }
        if !self.boundary().exists(root) {
            return Err(WalkError::NotFound {
                path: root.to_path_buf(),
            });
        }
        if !self.allows(root, rights) {
            return Ok(Vec::new());
        }

        let mut found = vec![root.to_path_buf()];
        self.expand_async(root.to_path_buf(), rights, cancel, &mut found)
            .await?;
        Ok(found)
    }

    /// Recursive helper for the async walk; boxed because the future
    /// refers to itself.
    #[cfg(feature = "async")]
    fn expand_async<'a>(
        &'a self,
        dir: PathBuf,
        rights: FileRights,
        cancel: &'a CancellationToken,
        found: &'a mut Vec<PathBuf>,
    ) -> BoxFuture<'a, Result<(), WalkError>>
    where
        F: Sync,
    {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(WalkError::Cancelled);
            }
            tokio::task::yield_now().await;

            let children = match self.boundary().subdirectories(&dir) {
                Ok(children) => children,
                Err(FsProbeError::Unauthorized) => {
                    debug!(dir = %dir.display(), "listing unauthorized, skipping children");
                    return Ok(());
                }
                Err(err) => {
                    debug!(dir = %dir.display(), error = %err, "listing failed, skipping children");
                    return Ok(());
                }
            };

            for child in children {
                if cancel.is_cancelled() {
                    return Err(WalkError::Cancelled);
                }
                if self.allows(&child, rights) {
                    found.push(child.clone());
                    self.expand_async(child, rights, cancel, found).await?;
                }
            }
            Ok(())
        })
    }

    /// Children of `dir` for the sync walk; any failure reads as no
    /// children.
    fn children_or_empty(&self, dir: &Path) -> vec::IntoIter<PathBuf> {
        match self.boundary().subdirectories(dir) {
            Ok(children) => children.into_iter(),
            Err(err) => {
                debug!(dir = %dir.display(), error = %err, "listing failed, skipping children");
                Vec::new().into_iter()
            }
        }
    }
}

/// Lazy depth-first cursor over the accessible subtree.
///
/// Directories are emitted pre-order. The cursor holds a stack of child
/// listings plus the most recently yielded directory, whose children are
/// listed only when the consumer asks for the next element.
#[derive(Debug)]
pub struct AccessibleDirs<'a, F> {
    eval: &'a AccessEvaluator<F>,
    rights: FileRights,
    stack: Vec<vec::IntoIter<PathBuf>>,
    to_expand: Option<PathBuf>,
}

impl<F: DirectoryAccess> Iterator for AccessibleDirs<'_, F> {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        if let Some(dir) = self.to_expand.take() {
            self.stack.push(self.eval.children_or_empty(&dir));
        }
        loop {
            let candidate = match self.stack.last_mut() {
                None => return None,
                Some(frame) => frame.next(),
            };
            match candidate {
                None => {
                    self.stack.pop();
                }
                Some(dir) => {
                    if self.eval.allows(&dir, self.rights) {
                        self.to_expand = Some(dir.clone());
                        return Some(dir);
                    }
                }
            }
        }
    }
}
