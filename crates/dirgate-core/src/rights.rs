//! Filesystem rights masks and composite-rights expansion.
//!
//! Rights are modelled as a bit-set matching the NT `FileSystemRights`
//! constants: elementary bits in the low word plus four composite
//! ("generic") bits in the top nibble. Composite bits never take part in
//! superset comparisons directly; [`FileRights::normalize`] expands them
//! into their elementary equivalents first.

use bitflags::bitflags;

bitflags! {
    /// A bit-set over filesystem permissions.
    ///
    /// Values follow the NT access-mask layout so masks read off a real
    /// ACL compare without translation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FileRights: u32 {
        /// Read file data, or list the entries of a directory.
        const READ_DATA = 0x0000_0001;
        /// Alias of [`READ_DATA`](Self::READ_DATA) for directories.
        const LIST_DIRECTORY = 0x0000_0001;
        /// Write file data, or create files in a directory.
        const WRITE_DATA = 0x0000_0002;
        /// Append file data, or create subdirectories.
        const APPEND_DATA = 0x0000_0004;
        const READ_EXTENDED_ATTRIBUTES = 0x0000_0008;
        const WRITE_EXTENDED_ATTRIBUTES = 0x0000_0010;
        /// Execute a file, or traverse a directory.
        const EXECUTE_FILE = 0x0000_0020;
        const DELETE_SUBDIRECTORIES_AND_FILES = 0x0000_0040;
        const READ_ATTRIBUTES = 0x0000_0080;
        const WRITE_ATTRIBUTES = 0x0000_0100;
        const DELETE = 0x0001_0000;
        /// Read the ACL itself.
        const READ_PERMISSIONS = 0x0002_0000;
        const CHANGE_PERMISSIONS = 0x0004_0000;
        const TAKE_OWNERSHIP = 0x0008_0000;
        const SYNCHRONIZE = 0x0010_0000;

        /// Every elementary right.
        const FULL_CONTROL = 0x001F_01FF;

        /// Standard read bundle.
        const READ = Self::READ_DATA.bits()
            | Self::READ_EXTENDED_ATTRIBUTES.bits()
            | Self::READ_ATTRIBUTES.bits()
            | Self::READ_PERMISSIONS.bits();
        /// Standard write bundle.
        const WRITE = Self::WRITE_DATA.bits()
            | Self::APPEND_DATA.bits()
            | Self::WRITE_EXTENDED_ATTRIBUTES.bits()
            | Self::WRITE_ATTRIBUTES.bits();
        /// Read plus execute.
        const READ_AND_EXECUTE = Self::READ.bits() | Self::EXECUTE_FILE.bits();
        /// Read, write, execute and delete: the default mask for access checks.
        const MODIFY = Self::READ_AND_EXECUTE.bits() | Self::WRITE.bits() | Self::DELETE.bits();

        /// Composite bit: expands via [`normalize`](Self::normalize).
        const GENERIC_ALL = 0x1000_0000;
        /// Composite bit: expands via [`normalize`](Self::normalize).
        const GENERIC_EXECUTE = 0x2000_0000;
        /// Composite bit: expands via [`normalize`](Self::normalize).
        const GENERIC_WRITE = 0x4000_0000;
        /// Composite bit: expands via [`normalize`](Self::normalize).
        const GENERIC_READ = 0x8000_0000;
    }
}

impl FileRights {
    const GENERIC_MASK: FileRights = Self::GENERIC_READ
        .union(Self::GENERIC_WRITE)
        .union(Self::GENERIC_EXECUTE)
        .union(Self::GENERIC_ALL);

    /// Expand composite (generic) bits into their elementary equivalents.
    ///
    /// A mask containing no composite bit is returned unchanged. When more
    /// than one composite bit is set the expansions union. Pure and
    /// idempotent: normalizing an already-elementary mask is the identity.
    #[must_use]
    pub fn normalize(self) -> FileRights {
        if !self.intersects(Self::GENERIC_MASK) {
            return self;
        }

        let mut mapped = FileRights::empty();
        if self.contains(Self::GENERIC_EXECUTE) {
            mapped |= Self::EXECUTE_FILE
                | Self::READ_PERMISSIONS
                | Self::READ_ATTRIBUTES
                | Self::SYNCHRONIZE;
        }
        if self.contains(Self::GENERIC_READ) {
            mapped |= Self::READ_ATTRIBUTES
                | Self::READ_DATA
                | Self::READ_EXTENDED_ATTRIBUTES
                | Self::READ_PERMISSIONS
                | Self::SYNCHRONIZE;
        }
        if self.contains(Self::GENERIC_WRITE) {
            mapped |= Self::APPEND_DATA
                | Self::WRITE_ATTRIBUTES
                | Self::WRITE_DATA
                | Self::WRITE_EXTENDED_ATTRIBUTES
                | Self::READ_PERMISSIONS
                | Self::SYNCHRONIZE;
        }
        if self.contains(Self::GENERIC_ALL) {
            mapped |= Self::FULL_CONTROL;
        }
        mapped
    }

    /// An all-ones raw mask marks an entry that grants nothing; such
    /// entries never qualify during evaluation.
    #[must_use]
    pub fn is_no_access_sentinel(self) -> bool {
        self.bits() == u32::MAX
    }
}
