use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use nix::sys::stat::{Mode, SFlag, mknod};

use crate::errlog::ErrorLog;
use crate::error::{Error, Result, SoftError};
use crate::facility::{LinuxAttr, apply_optional};
use crate::fs::{FileKind, file_time, is_superuser, resolve_gid, resolve_uid};
use crate::record::MetadataRecord;

/// Options for [`MetadataRecord::apply_to_path`] and
/// [`MetadataRecord::create_path`].
#[derive(Debug, Clone, Copy)]
pub struct RestoreOptions {
    /// Restore owner and group by numeric id only, ignoring recorded names.
    pub numeric_ids: bool,
    /// Create symbolic links. When false, symlink records are skipped.
    pub create_symlinks: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            numeric_ids: false,
            create_symlinks: true,
        }
    }
}

impl MetadataRecord {
    /// Apply the recorded attributes onto the existing entry at `path`.
    ///
    /// Each attribute is restored independently. A step that fails is
    /// recorded in `log` and the remaining steps still run, so this only
    /// fails for a record without file type bits. Permission bits are set
    /// after every other attribute except the immutable and append-only
    /// inode flags.
    pub fn apply_to_path(
        &self,
        path: impl AsRef<Path>,
        options: &RestoreOptions,
        log: &ErrorLog,
    ) -> Result<()> {
        let path = path.as_ref();
        let kind = self.kind().ok_or(Error::InvalidMode(self.mode))?;
        tracing::trace!(path = %path.display(), ?kind, "applying metadata");

        let mut errors = Vec::new();
        errors.extend(self.restore_times(path));
        errors.extend(self.restore_owner(path, options));
        #[cfg(feature = "acl")]
        errors.extend(apply_optional(self.posix1e_acl.as_ref(), path, kind));
        // Immutable and append-only would refuse the steps that follow, so
        // they are set on their own once everything else is in place.
        let unlocked = self.linux_attr.map(LinuxAttr::unlocked);
        errors.extend(apply_optional(unlocked.as_ref(), path, kind));
        #[cfg(feature = "xattr")]
        errors.extend(apply_optional(self.linux_xattr.as_ref(), path, kind));
        errors.extend(self.restore_mode(path, kind));
        let locked = self.linux_attr.filter(|attr| attr.is_locked());
        errors.extend(apply_optional(locked.as_ref(), path, kind));

        for err in errors {
            log.record(err);
        }
        Ok(())
    }

    /// Make the entry at `path` match this record's type, then apply its
    /// attributes.
    ///
    /// An existing directory is kept for a directory record. Any other
    /// existing entry is removed first, except that a non-empty directory is
    /// never removed and fails with [`Error::NonEmptyDirectory`].
    pub fn create_path(
        &self,
        path: impl AsRef<Path>,
        options: &RestoreOptions,
        log: &ErrorLog,
    ) -> Result<()> {
        let path = path.as_ref();
        let kind = match self.kind() {
            Some(kind) => kind,
            None => {
                log.record(SoftError::UnrecognizedMode {
                    path: path.to_path_buf(),
                    mode: self.mode,
                });
                return Ok(());
            }
        };

        let keep_existing = self.clear_target(path, kind)?;
        if !keep_existing && !self.create_entry(path, kind, options)? {
            return Ok(());
        }

        self.apply_to_path(path, options, log)
    }

    // ========================================================================
    // CREATION
    // ========================================================================

    /// Removes whatever occupies `path` unless it can be reused. Returns true
    /// when an existing directory is kept for a directory record.
    fn clear_target(&self, path: &Path, kind: FileKind) -> Result<bool> {
        let existing = match std::fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Error::Stat(e, path.to_path_buf())),
        };

        if existing.is_dir() {
            if kind == FileKind::Directory {
                return Ok(true);
            }
            tracing::trace!(path = %path.display(), "removing directory in the way");
            return match std::fs::remove_dir(path) {
                Ok(()) => Ok(false),
                Err(e) if matches!(e.raw_os_error(), Some(libc::ENOTEMPTY | libc::EEXIST)) => {
                    Err(Error::NonEmptyDirectory(path.to_path_buf()))
                }
                Err(e) => Err(Error::RemoveFailed(e, path.to_path_buf())),
            };
        }

        tracing::trace!(path = %path.display(), "removing entry in the way");
        std::fs::remove_file(path).map_err(|e| Error::RemoveFailed(e, path.to_path_buf()))?;
        Ok(false)
    }

    /// Creates an empty entry of `kind`. Returns false when nothing was
    /// created because the record is a symlink that must not be restored.
    fn create_entry(
        &self,
        path: &Path,
        kind: FileKind,
        options: &RestoreOptions,
    ) -> Result<bool> {
        let private = Mode::from_bits_truncate(0o600);

        match kind {
            FileKind::Regular => {
                std::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .mode(0o600)
                    .open(path)
                    .map_err(|e| Error::CreateFileFailed(e, path.to_path_buf()))?;
            }
            FileKind::Directory => {
                std::fs::DirBuilder::new()
                    .mode(0o700)
                    .create(path)
                    .map_err(|e| Error::CreateDirFailed(e, path.to_path_buf()))?;
            }
            FileKind::Symlink => match &self.symlink_target {
                Some(target) if options.create_symlinks => {
                    let target = OsStr::from_bytes(target);
                    std::os::unix::fs::symlink(target, path).map_err(|e| {
                        Error::CreateLinkFailed(e, path.to_path_buf(), PathBuf::from(target))
                    })?;
                }
                _ => {
                    tracing::debug!(path = %path.display(), "not creating symlink");
                    return Ok(false);
                }
            },
            FileKind::Fifo => {
                nix::unistd::mkfifo(path, private)
                    .map_err(|e| Error::CreateSpecialFailed(e.into(), path.to_path_buf()))?;
            }
            FileKind::CharDevice | FileKind::BlockDevice => {
                let flag = if kind == FileKind::CharDevice {
                    SFlag::S_IFCHR
                } else {
                    SFlag::S_IFBLK
                };
                let rdev = self.device.map(|d| d.to_rdev()).unwrap_or(0);
                mknod(path, flag, private, rdev)
                    .map_err(|e| Error::CreateSpecialFailed(e.into(), path.to_path_buf()))?;
            }
            FileKind::Socket => create_socket(path, private)?,
        }

        Ok(true)
    }

    // ========================================================================
    // ATTRIBUTE STEPS
    // ========================================================================

    fn restore_times(&self, path: &Path) -> Option<SoftError> {
        let atime = file_time(self.atime);
        let mtime = file_time(self.mtime);

        filetime::set_symlink_file_times(path, atime, mtime)
            .err()
            .map(|source| SoftError::Utime {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Resolves the recorded owner and group, then changes ownership without
    /// following a symlink. Only the superuser changes the owning user.
    fn restore_owner(&self, path: &Path, options: &RestoreOptions) -> Vec<SoftError> {
        let mut errors = Vec::new();
        let mut uid = self.uid;
        let mut gid = self.gid;

        if !options.numeric_ids {
            if let Some(name) = &self.owner {
                match resolve_uid(name) {
                    Some(id) => uid = id,
                    None => errors.push(SoftError::UnknownOwner {
                        kind: "user",
                        name: name.clone(),
                        id: uid,
                        path: path.to_path_buf(),
                    }),
                }
            }
            if let Some(name) = &self.group {
                match resolve_gid(name) {
                    Some(id) => gid = id,
                    None => errors.push(SoftError::UnknownOwner {
                        kind: "group",
                        name: name.clone(),
                        id: gid,
                        path: path.to_path_buf(),
                    }),
                }
            }
        }

        let uid = if is_superuser() { Some(uid) } else { None };
        if let Err(source) = std::os::unix::fs::lchown(path, uid, Some(gid)) {
            errors.push(SoftError::Lchown {
                path: path.to_path_buf(),
                source,
            });
        }
        errors
    }

    fn restore_mode(&self, path: &Path, kind: FileKind) -> Option<SoftError> {
        // chmod would follow the link.
        if kind == FileKind::Symlink {
            return None;
        }

        let perms = std::fs::Permissions::from_mode(self.permissions());
        std::fs::set_permissions(path, perms)
            .err()
            .map(|source| SoftError::Chmod {
                path: path.to_path_buf(),
                source,
            })
    }
}

fn create_socket(path: &Path, mode: Mode) -> Result<()> {
    match mknod(path, SFlag::S_IFSOCK, mode, 0) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::EINVAL | nix::errno::Errno::EPERM) => {
            // Some systems refuse mknod for sockets. Binding leaves the
            // socket file behind once the listener is dropped.
            std::os::unix::net::UnixListener::bind(path)
                .map(drop)
                .map_err(|e| Error::CreateSpecialFailed(e, path.to_path_buf()))
        }
        Err(e) => Err(Error::CreateSpecialFailed(e.into(), path.to_path_buf())),
    }
}
