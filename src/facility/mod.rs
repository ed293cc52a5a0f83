//! Optional, platform-dependent metadata facilities.
//!
//! Each facility captures one optional field of a
//! [`MetadataRecord`](crate::MetadataRecord) and knows how to put it back.
//! A facility that is not compiled in, or that the filesystem does not
//! support, yields no field on capture and does nothing on apply.

use std::path::Path;

use crate::error::SoftError;
use crate::fs::FileKind;

#[cfg(feature = "acl")]
mod acl;
mod linux_attr;
#[cfg(feature = "xattr")]
mod xattrs;

#[cfg(feature = "acl")]
pub use self::acl::{Acl, AclEntry, AclTag, PosixAcl};
pub use self::linux_attr::LinuxAttr;
#[cfg(feature = "xattr")]
pub use self::xattrs::XattrList;

pub trait Facility: Sized {
    /// Short name used in logs.
    const NAME: &'static str;

    /// Whether this build and platform can capture and apply the facility.
    fn supported() -> bool;

    /// Read the facility from `path`.
    ///
    /// `Ok(None)` means there is nothing to record, either because the
    /// facility is unsupported here or because the entry carries none.
    fn capture(path: &Path, kind: FileKind) -> Result<Option<Self>, SoftError>;

    /// Write the facility onto `path`, returning every failure encountered.
    fn apply(&self, path: &Path, kind: FileKind) -> Vec<SoftError>;
}

/// Runs [`Facility::capture`] and keeps the failure, if any, for the caller.
pub(crate) fn capture_into<F: Facility>(
    path: &Path,
    kind: FileKind,
    errors: &mut Vec<SoftError>,
) -> Option<F> {
    if !F::supported() {
        tracing::trace!(facility = F::NAME, "not supported on this build");
        return None;
    }

    match F::capture(path, kind) {
        Ok(value) => value,
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

/// Runs [`Facility::apply`] on an optional field.
pub(crate) fn apply_optional<F: Facility>(
    value: Option<&F>,
    path: &Path,
    kind: FileKind,
) -> Vec<SoftError> {
    match value {
        Some(value) if F::supported() => {
            tracing::trace!(facility = F::NAME, path = %path.display(), "applying");
            value.apply(path, kind)
        }
        _ => Vec::new(),
    }
}
