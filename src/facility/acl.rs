use std::fmt;
use std::path::Path;

use super::Facility;
use crate::attrs::{XATTR_ACL_ACCESS, XATTR_ACL_DEFAULT};
use crate::encode::{encode_bytes, encode_u16_le, encode_u32_le, encode_u8};
use crate::error::SoftError;
use crate::fs::{FileKind, is_unsupported};
use crate::parse::{ParseError, Reader};

/// Version word at the head of the kernel's ACL xattr encoding.
const ACL_XATTR_VERSION: u32 = 2;
const ACL_UNDEFINED_ID: u32 = u32::MAX;
const ENTRY_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AclTag {
    UserObj,
    User,
    GroupObj,
    Group,
    Mask,
    Other,
}

impl AclTag {
    fn from_raw(raw: u16) -> Option<AclTag> {
        Some(match raw {
            0x01 => AclTag::UserObj,
            0x02 => AclTag::User,
            0x04 => AclTag::GroupObj,
            0x08 => AclTag::Group,
            0x10 => AclTag::Mask,
            0x20 => AclTag::Other,
            _ => return None,
        })
    }

    fn to_raw(self) -> u16 {
        match self {
            AclTag::UserObj => 0x01,
            AclTag::User => 0x02,
            AclTag::GroupObj => 0x04,
            AclTag::Group => 0x08,
            AclTag::Mask => 0x10,
            AclTag::Other => 0x20,
        }
    }

    /// Only named user and group entries carry an id.
    fn has_id(self) -> bool {
        matches!(self, AclTag::User | AclTag::Group)
    }

    fn prefix(self) -> char {
        match self {
            AclTag::UserObj | AclTag::User => 'u',
            AclTag::GroupObj | AclTag::Group => 'g',
            AclTag::Mask => 'm',
            AclTag::Other => 'o',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AclEntry {
    pub tag: AclTag,
    /// `rwx` bits, `r` being 4.
    pub perm: u16,
    pub id: Option<u32>,
}

impl fmt::Display for AclEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.tag.prefix())?;
        if let Some(id) = self.id {
            write!(f, "{}", id)?;
        }
        write!(
            f,
            ":{}{}{}",
            if self.perm & 4 != 0 { 'r' } else { '-' },
            if self.perm & 2 != 0 { 'w' } else { '-' },
            if self.perm & 1 != 0 { 'x' } else { '-' },
        )
    }
}

/// One POSIX.1e ACL, in the entry order the kernel reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Acl(pub Vec<AclEntry>);

impl Acl {
    /// Decodes the `system.posix_acl_*` xattr value.
    pub fn from_xattr(data: &[u8]) -> Result<Acl, ParseError> {
        let mut reader = Reader::new(data);
        let version = reader.u32()?;
        if version != ACL_XATTR_VERSION {
            return Err(ParseError::UnknownVersion(version));
        }
        if (data.len() - reader.position()) % ENTRY_LEN != 0 {
            return Err(ParseError::InvalidData("truncated ACL entry"));
        }

        let mut entries = Vec::with_capacity((data.len() - 4) / ENTRY_LEN);
        while !reader.is_empty() {
            let tag = AclTag::from_raw(reader.u16()?)
                .ok_or(ParseError::InvalidData("unknown ACL tag"))?;
            let perm = reader.u16()?;
            let id = reader.u32()?;
            entries.push(AclEntry {
                tag,
                perm,
                id: if tag.has_id() && id != ACL_UNDEFINED_ID {
                    Some(id)
                } else {
                    None
                },
            });
        }
        Ok(Acl(entries))
    }

    pub fn to_xattr(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.0.len() * ENTRY_LEN);
        encode_u32_le(&mut buf, ACL_XATTR_VERSION);
        for entry in &self.0 {
            encode_u16_le(&mut buf, entry.tag.to_raw());
            encode_u16_le(&mut buf, entry.perm);
            encode_u32_le(&mut buf, entry.id.unwrap_or(ACL_UNDEFINED_ID));
        }
        buf
    }
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", entry)?;
        }
        Ok(())
    }
}

/// Access ACL and, for directories, the default ACL inherited by new
/// children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PosixAcl {
    pub access: Option<Acl>,
    pub default: Option<Acl>,
}

impl PosixAcl {
    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        for acl in [&self.access, &self.default] {
            match acl {
                Some(acl) => {
                    encode_u8(buf, 1);
                    encode_bytes(buf, &acl.to_xattr());
                }
                None => encode_u8(buf, 0),
            }
        }
    }

    pub(crate) fn decode(reader: &mut Reader<'_>) -> Result<PosixAcl, ParseError> {
        let mut read_one = || -> Result<Option<Acl>, ParseError> {
            match reader.u8()? {
                0 => Ok(None),
                1 => Acl::from_xattr(reader.bytes()?).map(Some),
                _ => Err(ParseError::InvalidData("bad presence marker")),
            }
        };
        let access = read_one()?;
        let default = read_one()?;
        Ok(PosixAcl { access, default })
    }
}

/// Reads one ACL xattr. `Ok(None)` means the entry has no such ACL beyond
/// what its permission bits express.
fn read_acl(path: &Path, name: &str) -> std::io::Result<Option<Acl>> {
    match ::xattr::get(path, name)? {
        Some(value) => Ok(Some(Acl::from_xattr(&value)?)),
        None => Ok(None),
    }
}

/// Removes one ACL xattr, treating an absent one as already removed.
fn remove_acl(path: &Path, name: &str) -> std::io::Result<()> {
    match ::xattr::remove(path, name) {
        Err(e) if e.raw_os_error() == Some(libc::ENODATA) || is_unsupported(&e) => Ok(()),
        other => other,
    }
}

impl PosixAcl {
    /// Whether the entry carries nothing beyond its permission bits.
    pub fn is_minimal(&self) -> bool {
        self.access.is_none() && self.default.is_none()
    }
}

impl Facility for PosixAcl {
    const NAME: &'static str = "posix1e_acl";

    fn supported() -> bool {
        cfg!(target_os = "linux") && ::xattr::SUPPORTED_PLATFORM
    }

    /// A minimal ACL is recorded as a `PosixAcl` with neither list, so that
    /// applying it strips extended entries from the target. Nothing is
    /// recorded when the filesystem has no ACL support.
    fn capture(path: &Path, kind: FileKind) -> Result<Option<Self>, SoftError> {
        if kind == FileKind::Symlink {
            return Ok(None);
        }

        let read_error = |source: std::io::Error| SoftError::ReadAcl {
            path: path.to_path_buf(),
            source,
        };

        let access = match read_acl(path, XATTR_ACL_ACCESS) {
            Err(e) if is_unsupported(&e) => return Ok(None),
            other => other.map_err(read_error)?,
        };
        let default = if kind == FileKind::Directory {
            match read_acl(path, XATTR_ACL_DEFAULT) {
                Err(e) if is_unsupported(&e) => None,
                other => other.map_err(read_error)?,
            }
        } else {
            None
        };

        Ok(Some(PosixAcl { access, default }))
    }

    fn apply(&self, path: &Path, kind: FileKind) -> Vec<SoftError> {
        let mut errors = Vec::new();
        if kind == FileKind::Symlink {
            return errors;
        }

        let apply_error = |source: std::io::Error| SoftError::ApplyAcl {
            path: path.to_path_buf(),
            source,
        };

        let result = match &self.access {
            Some(access) => ::xattr::set(path, XATTR_ACL_ACCESS, &access.to_xattr()),
            None => remove_acl(path, XATTR_ACL_ACCESS),
        };
        if let Err(e) = result {
            errors.push(apply_error(e));
        }

        if kind == FileKind::Directory {
            let result = match &self.default {
                Some(default) => ::xattr::set(path, XATTR_ACL_DEFAULT, &default.to_xattr()),
                None => remove_acl(path, XATTR_ACL_DEFAULT),
            };
            if let Err(e) = result {
                errors.push(apply_error(e));
            }
        }

        errors
    }
}
