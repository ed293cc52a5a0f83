use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use crate::errlog::ErrorLog;
use crate::error::{Error, Result};
use crate::facility::{LinuxAttr, capture_into};
#[cfg(feature = "acl")]
use crate::facility::PosixAcl;
#[cfg(feature = "xattr")]
use crate::facility::XattrList;
use crate::fs::{DeviceNumber, FileKind, group_name, timestamps, user_name};
use crate::path::ArchivePath;
use crate::record::MetadataRecord;

/// Options for [`MetadataRecord::from_path`].
#[derive(Debug, Clone, Copy)]
pub struct CaptureOptions {
    /// Read and store the target of symbolic links.
    pub save_symlinks: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            save_symlinks: true,
        }
    }
}

impl MetadataRecord {
    /// Capture the metadata of `path` without following a final symlink.
    ///
    /// `archive_path` is stored as the record's path when given, otherwise
    /// the bytes of `path` are. Only a failing `lstat` or `readlink` fails
    /// the capture. Every optional facility that cannot be read is recorded
    /// in `log` and left absent.
    pub fn from_path(
        path: impl AsRef<Path>,
        archive_path: Option<&ArchivePath<'_>>,
        options: &CaptureOptions,
        log: &ErrorLog,
    ) -> Result<MetadataRecord> {
        let path = path.as_ref();
        let meta =
            std::fs::symlink_metadata(path).map_err(|e| Error::Stat(e, path.to_path_buf()))?;

        let mode = meta.mode();
        let kind = FileKind::from_mode(mode).ok_or(Error::InvalidMode(mode))?;

        let mut record = MetadataRecord::with_mode(mode);
        record.path = match archive_path {
            Some(archive_path) => archive_path.as_bytes().to_vec(),
            None => path.as_os_str().as_bytes().to_vec(),
        };
        record.uid = meta.uid();
        record.gid = meta.gid();
        record.owner = user_name(record.uid);
        record.group = group_name(record.gid);
        (record.atime, record.mtime, record.ctime) = timestamps(&meta);
        record.size = meta.size();

        if kind.is_device() {
            record.device = Some(DeviceNumber::from_rdev(meta.rdev()));
        }

        if kind == FileKind::Symlink && options.save_symlinks {
            let target = std::fs::read_link(path)
                .map_err(|e| Error::ReadLink(e, path.to_path_buf()))?
                .into_os_string()
                .into_vec();
            record.size = target.len() as u64;
            record.symlink_target = Some(target);
        }

        let mut errors = Vec::new();
        record.linux_attr = capture_into::<LinuxAttr>(path, kind, &mut errors);
        #[cfg(feature = "xattr")]
        {
            record.linux_xattr = capture_into::<XattrList>(path, kind, &mut errors);
        }
        #[cfg(feature = "acl")]
        {
            record.posix1e_acl = capture_into::<PosixAcl>(path, kind, &mut errors);
        }
        for err in errors {
            log.record(err);
        }

        tracing::trace!(path = %path.display(), ?kind, "captured metadata");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_regular_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("file");
        std::fs::write(&path, b"hello").unwrap();
        filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(13, 5)).unwrap();

        let log = ErrorLog::new();
        let record =
            MetadataRecord::from_path(&path, None, &CaptureOptions::default(), &log).unwrap();

        assert_eq!(record.kind(), Some(FileKind::Regular));
        assert_eq!(record.size, 5);
        assert_eq!(record.mtime, 13_000_000_005);
        assert_eq!(record.path, path.as_os_str().as_bytes());
        assert!(record.symlink_target.is_none());
        record.validate().unwrap();
    }

    #[test]
    fn archive_path_is_stored() {
        let dir = tempfile::TempDir::new().unwrap();
        let archive_path = ArchivePath::new(b"/a/./b/");

        let record = MetadataRecord::from_path(
            dir.path(),
            Some(&archive_path),
            &CaptureOptions::default(),
            &ErrorLog::new(),
        )
        .unwrap();
        assert_eq!(record.path, b"a/b/");
        assert!(record.is_dir());
    }

    #[test]
    fn symlink_target_is_optional() {
        let dir = tempfile::TempDir::new().unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink("some/target", &link).unwrap();
        let log = ErrorLog::new();

        let saved =
            MetadataRecord::from_path(&link, None, &CaptureOptions::default(), &log).unwrap();
        assert_eq!(saved.symlink_target.as_deref(), Some(&b"some/target"[..]));
        assert_eq!(saved.size, 11);

        let options = CaptureOptions {
            save_symlinks: false,
        };
        let unsaved = MetadataRecord::from_path(&link, None, &options, &log).unwrap();
        assert!(unsaved.is_symlink());
        assert!(unsaved.symlink_target.is_none());
        unsaved.validate().unwrap();
    }

    #[test]
    fn missing_path_is_a_hard_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = ErrorLog::new();
        let err = MetadataRecord::from_path(
            dir.path().join("nope"),
            None,
            &CaptureOptions::default(),
            &log,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Stat(..)));
        assert!(log.is_empty());
    }
}
