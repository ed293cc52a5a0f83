use std::path::PathBuf;

use crate::parse::ParseError;
use crate::path::IntoExtractPathError;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures that abort a capture or a restore of a single entry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot stat path. Path: '{}'", .1.display())]
    Stat(#[source] std::io::Error, PathBuf),

    #[error("Cannot read symlink target. Path: '{}'", .1.display())]
    ReadLink(#[source] std::io::Error, PathBuf),

    #[error("Record has no file type bits (mode {0:#o})")]
    InvalidMode(u32),

    #[error("Invalid record: {0}")]
    InvalidRecord(&'static str),

    #[error("Refusing to overwrite non-empty directory. Path: '{}'", .0.display())]
    NonEmptyDirectory(PathBuf),

    #[error("Removing existing entry failed. Path: '{}'", .1.display())]
    RemoveFailed(#[source] std::io::Error, PathBuf),

    #[error("Creating directory failed. Path: '{}'", .1.display())]
    CreateDirFailed(#[source] std::io::Error, PathBuf),

    #[error("Creating file failed. Path: '{}'", .1.display())]
    CreateFileFailed(#[source] std::io::Error, PathBuf),

    #[error("Creating link failed. Path: '{}' -> '{}'", .1.display(), .2.display())]
    CreateLinkFailed(#[source] std::io::Error, PathBuf, PathBuf),

    #[error("Creating special file failed. Path: '{}'", .1.display())]
    CreateSpecialFailed(#[source] std::io::Error, PathBuf),

    #[error("Unsafe extraction path")]
    RiskyPath(#[from] IntoExtractPathError),

    #[error("Cannot decode metadata record")]
    Decode(#[from] ParseError),
}

/// Failures of a secondary facility. These are recorded in an
/// [`ErrorLog`](crate::ErrorLog) and the operation carries on.
///
/// The rendered message always begins with a prefix naming the facility.
#[derive(Debug, thiserror::Error)]
pub enum SoftError {
    #[error("utime: {}: {source}", .path.display())]
    Utime {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("lchown: {}: {source}", .path.display())]
    Lchown {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("chmod: {}: {source}", .path.display())]
    Chmod {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ignoring unknown {kind} '{name}' for '{}', using id {id}", .path.display())]
    UnknownOwner {
        kind: &'static str,
        name: String,
        id: u32,
        path: PathBuf,
    },

    #[error("read Linux attr: {}: {source}", .path.display())]
    ReadLinuxAttr {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Linux chattr: {}: {source}", .path.display())]
    LinuxChattr {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read xattr: {}: {source}", .path.display())]
    ReadXattr {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("xattr.set '{name}': {}: {source}", .path.display())]
    XattrSet {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("xattr.remove '{name}': {}: {source}", .path.display())]
    XattrRemove {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read POSIX1e ACL: {}: {source}", .path.display())]
    ReadAcl {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("POSIX1e ACL applyto: {}: {source}", .path.display())]
    ApplyAcl {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not creating '{}' with unrecognized mode {mode:#o}", .path.display())]
    UnrecognizedMode { path: PathBuf, mode: u32 },
}

impl SoftError {
    /// The message prefix that identifies the failing facility.
    pub fn facility(&self) -> &'static str {
        match self {
            SoftError::Utime { .. } => "utime",
            SoftError::Lchown { .. } => "lchown",
            SoftError::Chmod { .. } => "chmod",
            SoftError::UnknownOwner { .. } => "ignoring unknown",
            SoftError::ReadLinuxAttr { .. } => "read Linux attr",
            SoftError::LinuxChattr { .. } => "Linux chattr",
            SoftError::ReadXattr { .. } => "read xattr",
            SoftError::XattrSet { .. } => "xattr.set",
            SoftError::XattrRemove { .. } => "xattr.remove",
            SoftError::ReadAcl { .. } => "read POSIX1e ACL",
            SoftError::ApplyAcl { .. } => "POSIX1e ACL applyto",
            SoftError::UnrecognizedMode { .. } => "not creating",
        }
    }
}
