//! Capture and restore of real filesystem entries.
//!
//! These tests capture records from a scratch tree, recreate the tree
//! elsewhere and compare what comes back.

use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use filetime::FileTime;
use hoard_meta::{
    CaptureOptions, Error, ErrorLog, Facility, FileKind, LinuxAttr, MetadataRecord,
    RestoreOptions,
    attrs::{FS_IMMUTABLE_FL, FS_NODUMP_FL, FS_NOATIME_FL},
};
use tempfile::TempDir;

fn capture(path: &Path, log: &ErrorLog) -> MetadataRecord {
    MetadataRecord::from_path(path, None, &CaptureOptions::default(), log).unwrap()
}

fn set_mode(path: &Path, mode: u32) {
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).unwrap();
}

/// Clears the immutable and append-only flags so the tempdir can be removed.
fn unlock(path: &Path) {
    let errors = LinuxAttr(FS_NODUMP_FL).apply(path, FileKind::Regular);
    assert!(errors.is_empty(), "{:?}", errors);
}

/// Setting the immutable flag needs `CAP_LINUX_IMMUTABLE` and a filesystem
/// that supports it.
fn immutable_supported(dir: &Path) -> bool {
    let scratch = dir.join("immutable-check");
    std::fs::write(&scratch, b"").unwrap();
    let locked = LinuxAttr(FS_IMMUTABLE_FL)
        .apply(&scratch, FileKind::Regular)
        .is_empty();
    if locked {
        unlock(&scratch);
    }
    std::fs::remove_file(&scratch).unwrap();
    locked
}

#[cfg(feature = "xattr")]
fn user_xattrs_supported(path: &Path) -> bool {
    ::xattr::set(path, "user.hoard-check", b"1").is_ok()
        && ::xattr::remove(path, "user.hoard-check").is_ok()
}

/// Builds `dir/{file, symlink -> file}` with fixed timestamps.
fn build_tree(root: &Path) -> std::path::PathBuf {
    let dir = root.join("src");
    std::fs::create_dir(&dir).unwrap();

    let file = dir.join("file");
    std::fs::write(&file, b"data").unwrap();
    filetime::set_file_mtime(&file, FileTime::from_unix_time(13, 0)).unwrap();

    let symlink = dir.join("symlink");
    std::os::unix::fs::symlink("file", &symlink).unwrap();
    filetime::set_symlink_file_times(&symlink, FileTime::zero(), FileTime::zero()).unwrap();

    filetime::set_file_mtime(&dir, FileTime::from_unix_time(42, 0)).unwrap();
    dir
}

#[test]
fn test_capture_and_restore_tree() {
    let temp_dir = TempDir::new().unwrap();
    let src = build_tree(temp_dir.path());
    let log = ErrorLog::new();

    let dir_m = capture(&src, &log);
    let file_m = capture(&src.join("file"), &log);
    let link_m = capture(&src.join("symlink"), &log);

    assert_eq!(dir_m.mtime, 42_000_000_000);
    assert_eq!(file_m.mtime, 13_000_000_000);
    assert_eq!(link_m.symlink_target.as_deref(), Some(&b"file"[..]));
    assert_eq!(link_m.size, 4);
    assert_eq!(link_m.mtime, 0);

    let dst = temp_dir.path().join("dst");
    let options = RestoreOptions::default();
    dir_m.create_path(&dst, &options, &log).unwrap();
    file_m.create_path(dst.join("file"), &options, &log).unwrap();
    link_m.create_path(dst.join("symlink"), &options, &log).unwrap();
    // Creating the children touched the directory.
    dir_m.apply_to_path(&dst, &options, &log).unwrap();

    let dir_r = capture(&dst, &log);
    let file_r = capture(&dst.join("file"), &log);
    let link_r = capture(&dst.join("symlink"), &log);

    assert_eq!(dir_r.kind(), Some(FileKind::Directory));
    assert_eq!(dir_r.mtime, 42_000_000_000);
    assert_eq!(dir_r.permissions(), dir_m.permissions());

    assert_eq!(file_r.kind(), Some(FileKind::Regular));
    assert_eq!(file_r.mtime, 13_000_000_000);
    assert_eq!(file_r.permissions(), file_m.permissions());

    assert_eq!(link_r.kind(), Some(FileKind::Symlink));
    assert_eq!(link_r.symlink_target.as_deref(), Some(&b"file"[..]));
    assert_eq!(link_r.size, 4);
    assert_eq!(link_r.mtime, 0);
}

#[test]
fn test_captured_records_survive_encoding() {
    let temp_dir = TempDir::new().unwrap();
    let src = build_tree(temp_dir.path());
    let log = ErrorLog::new();

    for name in ["", "file", "symlink"] {
        let record = capture(&src.join(name), &log);
        record.validate().unwrap();

        let bytes = record.encode();
        let (decoded, used) = MetadataRecord::decode(&bytes).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(decoded, record, "{}", record.summary_str());
    }
}

#[test]
fn test_restore_over_existing_target() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("foo");
    let log = ErrorLog::new();
    let options = RestoreOptions::default();

    std::fs::create_dir(&path).unwrap();
    let dir_m = capture(&path, &log);
    std::fs::remove_dir(&path).unwrap();
    std::fs::write(&path, b"").unwrap();
    let file_m = capture(&path, &log);

    // Directory over file.
    dir_m.create_path(&path, &options, &log).unwrap();
    assert!(path.is_dir());

    // Directory over directory.
    dir_m.create_path(&path, &options, &log).unwrap();
    assert!(path.is_dir());

    // File over empty directory.
    file_m.create_path(&path, &options, &log).unwrap();
    assert!(path.is_file());

    // File over file.
    file_m.create_path(&path, &options, &log).unwrap();
    assert!(path.is_file());

    // File over non-empty directory.
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir(&path).unwrap();
    std::fs::write(path.join("bar"), b"keep").unwrap();
    let err = file_m.create_path(&path, &options, &log).unwrap_err();
    assert!(matches!(err, Error::NonEmptyDirectory(_)), "{}", err);
    assert_eq!(std::fs::read(path.join("bar")).unwrap(), b"keep");

    // Directory over non-empty directory.
    std::fs::remove_file(path.join("bar")).unwrap();
    std::fs::create_dir(path.join("bar")).unwrap();
    dir_m.create_path(&path, &options, &log).unwrap();
    assert!(path.join("bar").is_dir());
}

#[test]
fn test_from_path_error() {
    if hoard_meta::fs::is_superuser() {
        return;
    }

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("foo");
    std::fs::create_dir(&path).unwrap();
    let linux_attr_supported = matches!(
        LinuxAttr::capture(temp_dir.path(), FileKind::Directory),
        Ok(Some(_))
    );

    let log = ErrorLog::new();
    let record = capture(&path, &log);
    assert_eq!(record.path, path.as_os_str().as_bytes());

    set_mode(&path, 0o000);
    let result = MetadataRecord::from_path(&path, None, &CaptureOptions::default(), &log);
    set_mode(&path, 0o700);

    assert!(result.is_ok());
    if linux_attr_supported {
        let messages = log.messages();
        let attr_errors: Vec<_> = messages
            .iter()
            .filter(|m| m.starts_with("read Linux attr"))
            .collect();
        assert_eq!(attr_errors.len(), 1, "{:?}", messages);
    }
}

#[test]
fn test_apply_to_path_restricted_access() {
    if hoard_meta::fs::is_superuser() {
        return;
    }

    let temp_dir = TempDir::new().unwrap();
    let parent = temp_dir.path().join("foo");
    let path = parent.join("bar");
    std::fs::create_dir(&parent).unwrap();
    std::fs::create_dir(&path).unwrap();

    let log = ErrorLog::new();
    let mut record = capture(&path, &log);
    record.linux_attr = Some(LinuxAttr(FS_NOATIME_FL));
    #[cfg(feature = "xattr")]
    {
        record.linux_xattr = Some(hoard_meta::XattrList(vec![(
            b"user.foo".to_vec(),
            b"bar".to_vec(),
        )]));
    }
    log.clear();

    set_mode(&parent, 0o000);
    let result = record.apply_to_path(&path, &RestoreOptions::default(), &log);
    set_mode(&parent, 0o700);
    result.unwrap();

    let messages = log.messages();
    let position = |prefix: &str| messages.iter().position(|m| m.starts_with(prefix));

    let utime = position("utime: ").expect("utime failure recorded");
    let mut last = utime;
    if cfg!(target_os = "linux") {
        let chattr = position("Linux chattr: ").expect("chattr failure recorded");
        assert!(chattr > last, "{:?}", messages);
        last = chattr;
    }
    if cfg!(feature = "xattr") {
        let xattr_set = position("xattr.set '").expect("xattr.set failure recorded");
        assert!(xattr_set > last, "{:?}", messages);
    }
}

#[test]
fn test_log_is_scoped_per_operation() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("file");
    std::fs::write(&path, b"").unwrap();

    let log = ErrorLog::new();
    let mut record = capture(&path, &log);
    record.owner = Some("hoard-no-such-user".into());
    log.clear();

    record
        .apply_to_path(&path, &RestoreOptions::default(), &log)
        .unwrap();
    let taken = log.take();
    assert!(taken
        .iter()
        .any(|e| e.to_string().starts_with("ignoring unknown user")));
    assert!(log.is_empty());
}

#[test]
fn test_restore_immutable_file() {
    let temp_dir = TempDir::new().unwrap();
    if !immutable_supported(temp_dir.path()) {
        return;
    }

    let src = temp_dir.path().join("src");
    std::fs::write(&src, b"data").unwrap();
    set_mode(&src, 0o644);
    filetime::set_file_mtime(&src, FileTime::from_unix_time(13, 0)).unwrap();

    let log = ErrorLog::new();
    let mut record = capture(&src, &log);
    record.linux_attr = Some(LinuxAttr(FS_IMMUTABLE_FL));
    #[cfg(feature = "xattr")]
    let with_xattr = user_xattrs_supported(&src);
    #[cfg(feature = "xattr")]
    {
        if with_xattr {
            record.linux_xattr = Some(hoard_meta::XattrList(vec![(
                b"user.foo".to_vec(),
                b"bar".to_vec(),
            )]));
        }
    }
    log.clear();

    let dst = temp_dir.path().join("dst");
    record
        .create_path(&dst, &RestoreOptions::default(), &log)
        .unwrap();
    let messages = log.messages();
    let restored = capture(&dst, &log);
    unlock(&dst);

    assert!(messages.is_empty(), "{:?}", messages);
    assert_eq!(restored.permissions(), 0o644);
    assert_eq!(restored.mtime, 13_000_000_000);
    let flags = restored.linux_attr.expect("flags captured").0;
    assert_ne!(flags & FS_IMMUTABLE_FL, 0);
    #[cfg(feature = "xattr")]
    {
        if with_xattr {
            let xattrs = restored.linux_xattr.expect("xattrs captured");
            assert_eq!(xattrs.get(b"user.foo"), Some(&b"bar"[..]));
        }
    }
}

#[test]
fn test_apply_to_missing_target_keeps_step_order() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("foo");
    std::fs::create_dir(&path).unwrap();

    let log = ErrorLog::new();
    let mut record = capture(&path, &log);
    record.linux_attr = Some(LinuxAttr(FS_NOATIME_FL | FS_IMMUTABLE_FL));
    #[cfg(feature = "xattr")]
    {
        record.linux_xattr = Some(hoard_meta::XattrList(vec![(
            b"user.foo".to_vec(),
            b"bar".to_vec(),
        )]));
    }
    std::fs::remove_dir(&path).unwrap();
    log.clear();

    // Every step fails with ENOENT, whoever runs the test.
    record
        .apply_to_path(&path, &RestoreOptions::default(), &log)
        .unwrap();

    let messages = log.messages();
    let position = |prefix: &str| messages.iter().position(|m| m.starts_with(prefix));

    let mut last = position("utime: ").expect("utime failure recorded");
    if cfg!(target_os = "linux") {
        let chattr = position("Linux chattr: ").expect("chattr failure recorded");
        assert!(chattr > last, "{:?}", messages);
        last = chattr;
    }
    if cfg!(feature = "xattr") {
        let xattr_set = position("xattr.set '").expect("xattr.set failure recorded");
        assert!(xattr_set > last, "{:?}", messages);
        last = xattr_set;
    }
    let chmod = position("chmod: ").expect("chmod failure recorded");
    assert!(chmod > last, "{:?}", messages);
    if cfg!(target_os = "linux") {
        // The immutable flag goes on after the permission bits.
        let locking = messages
            .iter()
            .rposition(|m| m.starts_with("Linux chattr: "))
            .expect("second chattr failure recorded");
        assert!(locking > chmod, "{:?}", messages);
    }
}
