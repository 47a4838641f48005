//! Security identities and the membership predicates the evaluator runs.
//!
//! An [`Identity`] is a plain value: a principal identifier plus the set
//! of groups it belongs to, resolved once by the caller and immutable for
//! the duration of an evaluation. Nothing in this module touches the OS.

use std::collections::HashSet;
use std::fmt;

/// An opaque security identifier, such as an NT SID string or a
/// `uid:1000` style POSIX identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SecurityId(String);

impl SecurityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier for a POSIX user id.
    #[must_use]
    pub fn user(uid: u32) -> Self {
        Self(format!("uid:{uid}"))
    }

    /// Identifier for a POSIX group id.
    #[must_use]
    pub fn group(gid: u32) -> Self {
        Self(format!("gid:{gid}"))
    }

    /// The well-known "everyone else" identifier used for POSIX world
    /// permission bits.
    #[must_use]
    pub fn everyone() -> Self {
        Self("other".to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecurityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SecurityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Whether an ACL subject identifies an individual account or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectKind {
    Account,
    Group,
}

/// A principal together with its group memberships.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    principal: SecurityId,
    groups: HashSet<SecurityId>,
}

impl Identity {
    pub fn new(principal: SecurityId, groups: impl IntoIterator<Item = SecurityId>) -> Self {
        Self {
            principal,
            groups: groups.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn principal(&self) -> &SecurityId {
        &self.principal
    }

    #[must_use]
    pub fn groups(&self) -> &HashSet<SecurityId> {
        &self.groups
    }

    /// Membership test ignoring the account/group distinction.
    #[must_use]
    pub fn is_member_of(&self, id: &SecurityId) -> bool {
        self.groups.contains(id)
    }

    /// Subject match for the direct/group evaluation track: account
    /// subjects must equal the principal exactly, group subjects must be
    /// one of the identity's groups.
    #[must_use]
    pub fn matches_subject(&self, subject: &SecurityId, kind: SubjectKind) -> bool {
        match kind {
            SubjectKind::Account => *subject == self.principal,
            SubjectKind::Group => self.groups.contains(subject),
        }
    }
}
