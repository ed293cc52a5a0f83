use std::path::Path;

use super::Facility;
use crate::attrs::{FS_APPEND_FL, FS_IMMUTABLE_FL};
use crate::error::SoftError;
use crate::fs::FileKind;

/// Linux inode flags as reported by `lsattr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinuxAttr(pub u32);

impl LinuxAttr {
    /// Flags that make the inode refuse any later metadata change.
    pub const LOCK_FLAGS: u32 = FS_IMMUTABLE_FL | FS_APPEND_FL;

    fn applies_to(kind: FileKind) -> bool {
        matches!(kind, FileKind::Regular | FileKind::Directory)
    }

    /// These flags with the immutable and append-only bits cleared.
    pub fn unlocked(self) -> LinuxAttr {
        LinuxAttr(self.0 & !Self::LOCK_FLAGS)
    }

    pub fn is_locked(self) -> bool {
        self.0 & Self::LOCK_FLAGS != 0
    }
}

impl Facility for LinuxAttr {
    const NAME: &'static str = "linux_attr";

    fn supported() -> bool {
        cfg!(target_os = "linux")
    }

    fn capture(path: &Path, kind: FileKind) -> Result<Option<Self>, SoftError> {
        if !Self::applies_to(kind) {
            return Ok(None);
        }

        match sys::get_flags(path) {
            Ok(flags) => Ok(Some(LinuxAttr(flags))),
            Err(e) if crate::fs::is_unsupported(&e) => {
                tracing::trace!(path = %path.display(), "no inode flag support");
                Ok(None)
            }
            Err(source) => Err(SoftError::ReadLinuxAttr {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn apply(&self, path: &Path, kind: FileKind) -> Vec<SoftError> {
        if !Self::applies_to(kind) || self.0 == 0 {
            return Vec::new();
        }

        match sys::set_flags(path, self.0) {
            Ok(()) => Vec::new(),
            Err(source) => vec![SoftError::LinuxChattr {
                path: path.to_path_buf(),
                source,
            }],
        }
    }
}

#[cfg(target_os = "linux")]
mod sys {
    use std::fs::File;
    use std::os::unix::fs::OpenOptionsExt;
    use std::os::unix::io::AsRawFd;
    use std::path::Path;

    use crate::attrs::{FS_EXTENT_FL, FS_MODIFIABLE_FL};

    // The kernel declares these with a `long` argument but transfers an int.
    nix::ioctl_read!(fs_ioc_getflags, b'f', 1, libc::c_long);
    nix::ioctl_write_ptr!(fs_ioc_setflags, b'f', 2, libc::c_long);

    fn open(path: &Path) -> std::io::Result<File> {
        std::fs::OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_NOFOLLOW)
            .open(path)
    }

    fn read_flags(file: &File) -> std::io::Result<u32> {
        let mut flags: libc::c_long = 0;
        // SAFETY: the fd is open for the duration of the call and `flags`
        // outlives it.
        unsafe { fs_ioc_getflags(file.as_raw_fd(), &mut flags) }?;
        Ok(flags as u32)
    }

    pub(super) fn get_flags(path: &Path) -> std::io::Result<u32> {
        read_flags(&open(path)?)
    }

    pub(super) fn set_flags(path: &Path, flags: u32) -> std::io::Result<()> {
        let file = open(path)?;
        let current = read_flags(&file)?;

        // The extents flag cannot be cleared once set.
        let flags = (flags & FS_MODIFIABLE_FL) | (current & FS_EXTENT_FL);
        let value = flags as libc::c_long;

        // SAFETY: as in `read_flags`.
        unsafe { fs_ioc_setflags(file.as_raw_fd(), &value) }?;
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use std::path::Path;

    pub(super) fn get_flags(_path: &Path) -> std::io::Result<u32> {
        Err(std::io::ErrorKind::Unsupported.into())
    }

    pub(super) fn set_flags(_path: &Path, _flags: u32) -> std::io::Result<()> {
        Err(std::io::ErrorKind::Unsupported.into())
    }
}
