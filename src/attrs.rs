//! Well-known constants for metadata records.
//!
//! Record tags for the serialized form, the extended attribute names owned by
//! the ACL facility, and the Linux inode flag bits understood by `chattr`.

// Record tags
/// Terminates a serialized record.
pub const TAG_END: u8 = 0;
/// Path the record was captured from.
pub const TAG_PATH: u8 = 1;
/// Legacy common block with (seconds, nanoseconds) timestamp pairs.
pub const TAG_COMMON_V1: u8 = 2;
/// Symlink target bytes.
pub const TAG_SYMLINK_TARGET: u8 = 3;
/// Linux inode flags.
pub const TAG_LINUX_ATTR: u8 = 5;
/// Extended attribute list.
pub const TAG_LINUX_XATTR: u8 = 6;
/// POSIX.1e access and default ACLs.
pub const TAG_POSIX1E_ACL: u8 = 7;
/// Common block with nanosecond timestamps.
pub const TAG_COMMON: u8 = 10;

// ACL storage
/// Extended attribute holding the access ACL.
pub const XATTR_ACL_ACCESS: &str = "system.posix_acl_access";
/// Extended attribute holding the default ACL of a directory.
pub const XATTR_ACL_DEFAULT: &str = "system.posix_acl_default";

/// Extended attributes that only the ACL facility reads or writes.
pub fn is_acl_xattr(name: &[u8]) -> bool {
    name == XATTR_ACL_ACCESS.as_bytes() || name == XATTR_ACL_DEFAULT.as_bytes()
}

// Linux inode flags (linux/fs.h)
pub const FS_SECRM_FL: u32 = 0x0000_0001;
pub const FS_UNRM_FL: u32 = 0x0000_0002;
pub const FS_COMPR_FL: u32 = 0x0000_0004;
pub const FS_SYNC_FL: u32 = 0x0000_0008;
pub const FS_IMMUTABLE_FL: u32 = 0x0000_0010;
pub const FS_APPEND_FL: u32 = 0x0000_0020;
pub const FS_NODUMP_FL: u32 = 0x0000_0040;
pub const FS_NOATIME_FL: u32 = 0x0000_0080;
pub const FS_JOURNAL_DATA_FL: u32 = 0x0000_4000;
pub const FS_NOTAIL_FL: u32 = 0x0000_8000;
pub const FS_DIRSYNC_FL: u32 = 0x0001_0000;
pub const FS_TOPDIR_FL: u32 = 0x0002_0000;
pub const FS_EXTENT_FL: u32 = 0x0008_0000;
pub const FS_NOCOW_FL: u32 = 0x0080_0000;

/// Flags a user can change with `chattr` (`acdeijstuADST`).
pub const FS_MODIFIABLE_FL: u32 = FS_APPEND_FL
    | FS_COMPR_FL
    | FS_NODUMP_FL
    | FS_EXTENT_FL
    | FS_IMMUTABLE_FL
    | FS_JOURNAL_DATA_FL
    | FS_SECRM_FL
    | FS_NOTAIL_FL
    | FS_UNRM_FL
    | FS_NOATIME_FL
    | FS_DIRSYNC_FL
    | FS_SYNC_FL
    | FS_TOPDIR_FL
    | FS_NOCOW_FL;
