//! Herein lies the metadata layer of the `hoard` backup tool.
//!
//! [MetadataRecord][MetadataRecord] captures everything the filesystem knows
//! about one entry and later recreates it. Paths crossing the archive boundary
//! go through [clean_archive_path][clean_archive_path] on the way in and
//! [clean_extract_path][clean_extract_path] on the way out. Failures of
//! optional facilities land in an [ErrorLog][ErrorLog] instead of aborting.

#[cfg(not(unix))]
compile_error!("hoard-meta only supports unix platforms");

pub mod attrs;
mod capture;
pub mod encode;
mod errlog;
mod error;
pub mod facility;
pub mod fs;
pub mod parse;
pub mod path;
mod record;
mod restore;

pub use capture::CaptureOptions;
pub use errlog::ErrorLog;
pub use error::{Error, Result, SoftError};
#[cfg(feature = "acl")]
pub use facility::{Acl, AclEntry, AclTag, PosixAcl};
pub use facility::{Facility, LinuxAttr};
#[cfg(feature = "xattr")]
pub use facility::XattrList;
pub use fs::{DeviceNumber, FileKind};
pub use parse::{ParseError, ParseResult};
pub use path::{
    ArchivePath, ExtractPath, IntoExtractPathError, clean_archive_path, clean_extract_path,
    is_risky_path,
};
pub use record::MetadataRecord;
pub use restore::RestoreOptions;
