//! Filesystem utilities shared by capture and restore.

use std::os::unix::fs::MetadataExt;

use filetime::FileTime;
use nix::unistd::{Gid, Group, Uid, User};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// The type of a filesystem entry, taken from the `S_IFMT` bits of a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
    CharDevice,
    BlockDevice,
    Fifo,
    Socket,
}

impl FileKind {
    pub fn from_mode(mode: u32) -> Option<FileKind> {
        use FileKind::*;

        match mode & libc::S_IFMT as u32 {
            x if x == libc::S_IFREG as u32 => Some(Regular),
            x if x == libc::S_IFDIR as u32 => Some(Directory),
            x if x == libc::S_IFLNK as u32 => Some(Symlink),
            x if x == libc::S_IFCHR as u32 => Some(CharDevice),
            x if x == libc::S_IFBLK as u32 => Some(BlockDevice),
            x if x == libc::S_IFIFO as u32 => Some(Fifo),
            x if x == libc::S_IFSOCK as u32 => Some(Socket),
            _ => None,
        }
    }

    /// The `S_IFMT` bits for this kind.
    pub fn type_bits(self) -> u32 {
        use FileKind::*;

        (match self {
            Regular => libc::S_IFREG,
            Directory => libc::S_IFDIR,
            Symlink => libc::S_IFLNK,
            CharDevice => libc::S_IFCHR,
            BlockDevice => libc::S_IFBLK,
            Fifo => libc::S_IFIFO,
            Socket => libc::S_IFSOCK,
        }) as u32
    }

    /// The leading character of an `ls -l` mode string.
    pub fn ls_char(self) -> char {
        use FileKind::*;

        match self {
            Regular => '-',
            Directory => 'd',
            Symlink => 'l',
            CharDevice => 'c',
            BlockDevice => 'b',
            Fifo => 'p',
            Socket => 's',
        }
    }

    pub fn is_device(self) -> bool {
        matches!(self, FileKind::CharDevice | FileKind::BlockDevice)
    }
}

/// Major and minor numbers of a device node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceNumber {
    pub major: u64,
    pub minor: u64,
}

impl DeviceNumber {
    pub fn from_rdev(rdev: u64) -> DeviceNumber {
        DeviceNumber {
            major: nix::sys::stat::major(rdev as libc::dev_t),
            minor: nix::sys::stat::minor(rdev as libc::dev_t),
        }
    }

    pub fn to_rdev(self) -> libc::dev_t {
        nix::sys::stat::makedev(self.major, self.minor)
    }
}

/// Combine a seconds/nanoseconds pair into nanoseconds since the epoch.
#[inline]
pub fn to_nanos(secs: i64, nsecs: i64) -> i64 {
    secs.saturating_mul(NANOS_PER_SEC).saturating_add(nsecs)
}

/// Split nanoseconds since the epoch into seconds and a non-negative
/// sub-second part.
#[inline]
pub fn split_nanos(ns: i64) -> (i64, u32) {
    (ns.div_euclid(NANOS_PER_SEC), ns.rem_euclid(NANOS_PER_SEC) as u32)
}

pub fn file_time(ns: i64) -> FileTime {
    let (secs, nsecs) = split_nanos(ns);
    FileTime::from_unix_time(secs, nsecs)
}

/// Timestamps of a stat result as (atime, mtime, ctime) in nanoseconds.
pub fn timestamps(meta: &std::fs::Metadata) -> (i64, i64, i64) {
    (
        to_nanos(meta.atime(), meta.atime_nsec()),
        to_nanos(meta.mtime(), meta.mtime_nsec()),
        to_nanos(meta.ctime(), meta.ctime_nsec()),
    )
}

pub fn user_name(uid: u32) -> Option<String> {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(user) => user.map(|u| u.name),
        Err(e) => {
            tracing::debug!(uid, error = %e, "user lookup failed");
            None
        }
    }
}

pub fn group_name(gid: u32) -> Option<String> {
    match Group::from_gid(Gid::from_raw(gid)) {
        Ok(group) => group.map(|g| g.name),
        Err(e) => {
            tracing::debug!(gid, error = %e, "group lookup failed");
            None
        }
    }
}

pub fn resolve_uid(name: &str) -> Option<u32> {
    User::from_name(name).ok().flatten().map(|u| u.uid.as_raw())
}

pub fn resolve_gid(name: &str) -> Option<u32> {
    Group::from_name(name).ok().flatten().map(|g| g.gid.as_raw())
}

pub fn is_superuser() -> bool {
    Uid::effective().is_root()
}

/// True for errno values meaning "this filesystem or kernel has no such
/// facility" rather than a real failure.
pub fn is_unsupported(err: &std::io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::ENOTTY) | Some(libc::ENOSYS) | Some(libc::EOPNOTSUPP)
    ) || err.kind() == std::io::ErrorKind::Unsupported
}
