//! Path normalization for both directions across the archive boundary.
//!
//! Paths are byte strings with `/` as the only separator. Two cleanups exist
//! because the two directions have different failure modes:
//!
//! * [`clean_archive_path`] names an entry inside the store. It always
//!   succeeds and folds away `.`, `..` and redundant separators.
//! * [`clean_extract_path`] produces a path that is about to be written to
//!   disk. It only strips leading separators and rejects anything
//!   [`is_risky_path`] flags.

use std::{
    borrow::Cow,
    ffi::OsStr,
    fmt,
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
};

mod error;

pub use self::error::IntoExtractPathError;

/// The separator used in archive and extract paths.
pub const PATH_SEP: u8 = b'/';

const CUR_DIR: &[u8] = b".";
const PARENT_DIR: &[u8] = b"..";

/// Normalize a path for storage inside an archive.
///
/// Leading separators and `.` components are dropped, `..` removes the
/// preceding component (or is itself dropped at the top), and a trailing
/// separator on the input is kept on a non-empty result. `...` is an ordinary
/// name. An empty result becomes `.`.
pub fn clean_archive_path(path: &[u8]) -> Vec<u8> {
    let mut out: Vec<&[u8]> = Vec::new();

    for component in path.split(|b| *b == PATH_SEP) {
        match component {
            b"" | b"." => {}
            b".." => {
                out.pop();
            }
            name => out.push(name),
        }
    }

    if out.is_empty() {
        return CUR_DIR.to_vec();
    }

    let mut result = out.join(&PATH_SEP);
    if path.last() == Some(&PATH_SEP) {
        result.push(PATH_SEP);
    }
    result
}

/// Returns true if writing `path` relative to a base directory could land
/// outside of it.
pub fn is_risky_path(path: &[u8]) -> bool {
    path.first() == Some(&PATH_SEP)
        || path
            .split(|b| *b == PATH_SEP)
            .any(|component| component == PARENT_DIR)
}

/// Gate a path before it is used for extraction.
///
/// Leading separators are stripped and the remainder is returned verbatim,
/// `.` components and trailing separators included. A bare root becomes `.`.
pub fn clean_extract_path(path: &[u8]) -> Result<&[u8], IntoExtractPathError> {
    let start = path
        .iter()
        .position(|b| *b != PATH_SEP)
        .unwrap_or(path.len());
    let stripped = &path[start..];

    if stripped.is_empty() {
        return Ok(CUR_DIR);
    }

    if is_risky_path(stripped) {
        return Err(IntoExtractPathError::Risky(path.to_vec()));
    }

    Ok(stripped)
}

/// A path as it is named inside an archive. Always normalized.
#[derive(Debug, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ArchivePath<'a>(pub(crate) Cow<'a, [u8]>);

impl<'a> ArchivePath<'a> {
    /// Borrows `path` when it is already normalized.
    pub fn new(path: &'a [u8]) -> ArchivePath<'a> {
        let cleaned = clean_archive_path(path);
        if cleaned == path {
            ArchivePath(Cow::Borrowed(path))
        } else {
            ArchivePath(Cow::Owned(cleaned))
        }
    }

    pub fn from_path(path: &'a Path) -> ArchivePath<'a> {
        Self::new(path.as_os_str().as_bytes())
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// True for the archive root, `.`.
    pub fn is_root(&self) -> bool {
        self.0.as_ref() == CUR_DIR
    }

    /// True if the source path carried a trailing separator.
    pub fn is_dir_hint(&self) -> bool {
        self.0.last() == Some(&PATH_SEP)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        let root = self.is_root();
        self.0
            .split(|b| *b == PATH_SEP)
            .filter(move |c| !c.is_empty() && !root)
    }

    pub fn depth(&self) -> usize {
        self.iter().count()
    }

    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(OsStr::from_bytes(&self.0))
    }

    pub fn into_owned(self) -> ArchivePath<'static> {
        ArchivePath(Cow::Owned(self.0.into_owned()))
    }
}

impl AsRef<[u8]> for ArchivePath<'_> {
    #[inline(always)]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ArchivePath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// A relative path that passed the extraction gate.
#[derive(Debug, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ExtractPath<'a>(pub(crate) Cow<'a, [u8]>);

impl<'a> ExtractPath<'a> {
    pub fn new(path: &'a [u8]) -> Result<ExtractPath<'a>, IntoExtractPathError> {
        clean_extract_path(path).map(|p| ExtractPath(Cow::Borrowed(p)))
    }

    pub fn from_path(path: &'a Path) -> Result<ExtractPath<'a>, IntoExtractPathError> {
        Self::new(path.as_os_str().as_bytes())
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_os_str(&self) -> &OsStr {
        OsStr::from_bytes(&self.0)
    }

    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(self.as_os_str())
    }

    /// The on-disk location of this path below `base`.
    pub fn under<P: AsRef<Path>>(&self, base: P) -> PathBuf {
        base.as_ref().join(self.as_os_str())
    }

    pub fn into_owned(self) -> ExtractPath<'static> {
        ExtractPath(Cow::Owned(self.0.into_owned()))
    }
}

impl AsRef<[u8]> for ExtractPath<'_> {
    #[inline(always)]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ExtractPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}
