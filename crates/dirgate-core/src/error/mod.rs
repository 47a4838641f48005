//! Error types for the dirgate crate
//!
//! Each error is defined next to the code that raises it; this module
//! re-exports them in one place.

pub use crate::access::AccessError;
pub use crate::fs::FsProbeError;
pub use crate::walk::WalkError;

#[cfg(feature = "async")]
pub use crate::lockwait::LockWaitError;
