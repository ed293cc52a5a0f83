use crate::attrs::*;
use crate::encode::{
    encode_bytes, encode_i64_le, encode_opt_str, encode_section, encode_u32_le, encode_u64_le,
    encode_u8,
};
use crate::error::{Error, Result};
use crate::facility::LinuxAttr;
#[cfg(feature = "acl")]
use crate::facility::PosixAcl;
#[cfg(feature = "xattr")]
use crate::facility::XattrList;
use crate::fs::{DeviceNumber, FileKind, to_nanos};
use crate::parse::{ParseError, ParseResult, Reader};

/// Snapshot of everything the filesystem reports about one entry.
///
/// Records are produced by [`MetadataRecord::from_path`] and consumed by
/// [`MetadataRecord::apply_to_path`] and [`MetadataRecord::create_path`].
/// Restoring never mutates the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    /// Path the record was captured from. Informational only.
    pub path: Vec<u8>,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    /// Advisory names used when restoring by name.
    pub owner: Option<String>,
    pub group: Option<String>,
    /// Nanoseconds since the epoch.
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub size: u64,
    pub symlink_target: Option<Vec<u8>>,
    pub device: Option<DeviceNumber>,
    pub linux_attr: Option<LinuxAttr>,
    #[cfg(feature = "xattr")]
    pub linux_xattr: Option<XattrList>,
    #[cfg(feature = "acl")]
    pub posix1e_acl: Option<PosixAcl>,
}

impl MetadataRecord {
    /// An empty record of the given mode. Fails when `mode` carries no file
    /// type bits.
    pub fn new(mode: u32) -> Result<MetadataRecord> {
        if FileKind::from_mode(mode).is_none() {
            return Err(Error::InvalidMode(mode));
        }
        Ok(MetadataRecord::with_mode(mode))
    }

    pub(crate) fn with_mode(mode: u32) -> MetadataRecord {
        MetadataRecord {
            path: Vec::new(),
            mode,
            uid: 0,
            gid: 0,
            owner: None,
            group: None,
            atime: 0,
            mtime: 0,
            ctime: 0,
            size: 0,
            symlink_target: None,
            device: None,
            linux_attr: None,
            #[cfg(feature = "xattr")]
            linux_xattr: None,
            #[cfg(feature = "acl")]
            posix1e_acl: None,
        }
    }

    #[inline(always)]
    pub fn kind(&self) -> Option<FileKind> {
        FileKind::from_mode(self.mode)
    }

    /// Permission bits including setuid, setgid and sticky.
    #[inline(always)]
    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == Some(FileKind::Directory)
    }

    pub fn is_symlink(&self) -> bool {
        self.kind() == Some(FileKind::Symlink)
    }

    /// Checks the structural invariants of a record.
    ///
    /// A symlink may lack a target when it was captured without saving
    /// symlink targets; every other combination must be consistent.
    pub fn validate(&self) -> Result<()> {
        let kind = self.kind().ok_or(Error::InvalidMode(self.mode))?;

        match (&self.symlink_target, kind) {
            (Some(target), FileKind::Symlink) => {
                if self.size != target.len() as u64 {
                    return Err(Error::InvalidRecord("symlink size differs from target length"));
                }
            }
            (Some(_), _) => return Err(Error::InvalidRecord("symlink target on a non-symlink")),
            (None, _) => {}
        }

        if self.device.is_some() && !kind.is_device() {
            return Err(Error::InvalidRecord("device numbers on a non-device"));
        }

        Ok(())
    }

    // ========================================================================
    // DESCRIPTIONS
    // ========================================================================

    /// `ls -l` style mode string, e.g. `drwxr-xr-x`.
    pub fn mode_str(&self) -> String {
        let mut s = String::with_capacity(10);
        s.push(self.kind().map(FileKind::ls_char).unwrap_or('?'));

        for (shift, special, mark) in [(6, 0o4000, 's'), (3, 0o2000, 's'), (0, 0o1000, 't')] {
            let bits = (self.mode >> shift) & 0o7;
            s.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            s.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            s.push(match (bits & 0o1 != 0, self.mode & special != 0) {
                (true, true) => mark,
                (false, true) => mark.to_ascii_uppercase(),
                (true, false) => 'x',
                (false, false) => '-',
            });
        }
        s
    }

    /// One line in the manner of `ls -l`.
    pub fn summary_str(&self) -> String {
        let owner = self.owner.clone().unwrap_or_else(|| self.uid.to_string());
        let group = self.group.clone().unwrap_or_else(|| self.gid.to_string());
        let size = match self.device {
            Some(dev) => format!("{},{}", dev.major, dev.minor),
            None => self.size.to_string(),
        };

        let mut line = format!(
            "{} {}/{} {} {} {}",
            self.mode_str(),
            owner,
            group,
            size,
            format_time(self.mtime),
            String::from_utf8_lossy(&self.path),
        );
        if let Some(target) = &self.symlink_target {
            line.push_str(" -> ");
            line.push_str(&String::from_utf8_lossy(target));
        }
        line
    }

    /// Every present field as a JSON object.
    pub fn detailed(&self) -> serde_json::Value {
        use serde_json::{Map, Value, json};

        let mut out = Map::new();
        out.insert("path".into(), json!(String::from_utf8_lossy(&self.path)));
        out.insert("mode".into(), json!(format!("{:o} ({})", self.mode, self.mode_str())));
        if let Some(kind) = self.kind() {
            out.insert("kind".into(), json!(format!("{:?}", kind)));
        }
        out.insert("uid".into(), json!(self.uid));
        out.insert("gid".into(), json!(self.gid));
        if let Some(owner) = &self.owner {
            out.insert("owner".into(), json!(owner));
        }
        if let Some(group) = &self.group {
            out.insert("group".into(), json!(group));
        }
        out.insert("atime".into(), json!(self.atime));
        out.insert("mtime".into(), json!(self.mtime));
        out.insert("ctime".into(), json!(self.ctime));
        out.insert("size".into(), json!(self.size));
        if let Some(target) = &self.symlink_target {
            out.insert("symlink_target".into(), json!(String::from_utf8_lossy(target)));
        }
        if let Some(dev) = self.device {
            out.insert("device".into(), json!({ "major": dev.major, "minor": dev.minor }));
        }
        if let Some(attr) = self.linux_attr {
            out.insert("linux_attr".into(), json!(format!("{:#x}", attr.0)));
        }
        #[cfg(feature = "xattr")]
        {
            if let Some(xattrs) = &self.linux_xattr {
                out.insert("linux_xattr".into(), xattrs_json(xattrs));
            }
        }
        #[cfg(feature = "acl")]
        {
            if let Some(acl) = &self.posix1e_acl {
                out.insert("posix1e_acl".into(), acl_json(acl));
            }
        }

        Value::Object(out)
    }

    // ========================================================================
    // SERIALIZATION
    // ========================================================================

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128 + self.path.len());

        if !self.path.is_empty() {
            encode_section(&mut buf, TAG_PATH, |b| b.extend_from_slice(&self.path));
        }

        encode_section(&mut buf, TAG_COMMON, |b| {
            self.encode_ids(b);
            encode_i64_le(b, self.atime);
            encode_i64_le(b, self.mtime);
            encode_i64_le(b, self.ctime);
        });

        if let Some(target) = &self.symlink_target {
            encode_section(&mut buf, TAG_SYMLINK_TARGET, |b| b.extend_from_slice(target));
        }

        if let Some(attr) = self.linux_attr {
            encode_section(&mut buf, TAG_LINUX_ATTR, |b| encode_u32_le(b, attr.0));
        }

        #[cfg(feature = "xattr")]
        {
            if let Some(xattrs) = &self.linux_xattr {
                encode_section(&mut buf, TAG_LINUX_XATTR, |b| {
                    encode_u32_le(b, xattrs.len() as u32);
                    for (name, value) in &xattrs.0 {
                        encode_bytes(b, name);
                        encode_bytes(b, value);
                    }
                });
            }
        }

        #[cfg(feature = "acl")]
        {
            if let Some(acl) = &self.posix1e_acl {
                encode_section(&mut buf, TAG_POSIX1E_ACL, |b| acl.encode(b));
            }
        }

        encode_u8(&mut buf, TAG_END);
        tracing::debug!(
            len = buf.len(),
            path = %String::from_utf8_lossy(&self.path),
            "encoded record"
        );
        buf
    }

    fn encode_ids(&self, buf: &mut Vec<u8>) {
        encode_u32_le(buf, self.mode);
        encode_u32_le(buf, self.uid);
        encode_u32_le(buf, self.gid);
        encode_opt_str(buf, self.owner.as_deref());
        encode_opt_str(buf, self.group.as_deref());
        encode_u64_le(buf, self.device.map(|d| d.to_rdev() as u64).unwrap_or(0));
        encode_u64_le(buf, self.size);
    }

    /// Decodes a record, returning it with the number of bytes consumed.
    ///
    /// Sections with unknown tags are skipped. Both the current and the
    /// legacy timestamp layouts are accepted.
    pub fn decode(data: &[u8]) -> ParseResult<MetadataRecord> {
        let mut reader = Reader::new(data);
        let mut record: Option<MetadataRecord> = None;
        let mut path = Vec::new();
        let mut symlink_target = None;
        let mut linux_attr = None;
        #[cfg(feature = "xattr")]
        let mut linux_xattr = None;
        #[cfg(feature = "acl")]
        let mut posix1e_acl = None;

        loop {
            let tag = reader.u8()?;
            if tag == TAG_END {
                break;
            }
            let body = reader.bytes()?;
            let mut section = Reader::new(body);

            match tag {
                TAG_PATH => path = body.to_vec(),
                TAG_COMMON => record = Some(decode_common(&mut section, false)?),
                TAG_COMMON_V1 => record = Some(decode_common(&mut section, true)?),
                TAG_SYMLINK_TARGET => symlink_target = Some(body.to_vec()),
                TAG_LINUX_ATTR => linux_attr = Some(LinuxAttr(section.u32()?)),
                #[cfg(feature = "xattr")]
                TAG_LINUX_XATTR => {
                    let count = section.u32()?;
                    let mut list = Vec::new();
                    for _ in 0..count {
                        let name = section.bytes()?.to_vec();
                        let value = section.bytes()?.to_vec();
                        list.push((name, value));
                    }
                    linux_xattr = Some(XattrList(list));
                }
                #[cfg(feature = "acl")]
                TAG_POSIX1E_ACL => posix1e_acl = Some(PosixAcl::decode(&mut section)?),
                _ => tracing::trace!(tag, len = body.len(), "skipping unknown record section"),
            }
        }

        let mut record = record.ok_or(ParseError::InvalidData("record has no common section"))?;
        record.path = path;
        record.symlink_target = symlink_target;
        record.linux_attr = linux_attr;
        #[cfg(feature = "xattr")]
        {
            record.linux_xattr = linux_xattr;
        }
        #[cfg(feature = "acl")]
        {
            record.posix1e_acl = posix1e_acl;
        }

        record.validate().map_err(|e| match e {
            Error::InvalidRecord(msg) => ParseError::InvalidData(msg),
            _ => ParseError::InvalidData("invalid record"),
        })?;

        tracing::debug!(summary = %record.summary_str(), "decoded record");
        Ok((record, reader.position()))
    }
}

fn decode_common(
    reader: &mut Reader<'_>,
    legacy: bool,
) -> std::result::Result<MetadataRecord, ParseError> {
    let mode = reader.u32()?;
    let kind = FileKind::from_mode(mode).ok_or(ParseError::InvalidData("mode has no file type"))?;

    let mut record = MetadataRecord::with_mode(mode);
    record.uid = reader.u32()?;
    record.gid = reader.u32()?;
    record.owner = reader.opt_str()?.map(str::to_owned);
    record.group = reader.opt_str()?.map(str::to_owned);
    let rdev = reader.u64()?;
    record.size = reader.u64()?;

    if kind.is_device() {
        record.device = Some(DeviceNumber::from_rdev(rdev));
    }

    let mut time = || -> std::result::Result<i64, ParseError> {
        if legacy {
            let secs = reader.i64()?;
            let nsecs = reader.u32()?;
            Ok(to_nanos(secs, nsecs as i64))
        } else {
            reader.i64()
        }
    };
    record.atime = time()?;
    record.mtime = time()?;
    record.ctime = time()?;

    Ok(record)
}

#[cfg(feature = "xattr")]
fn xattrs_json(xattrs: &XattrList) -> serde_json::Value {
    xattrs
        .0
        .iter()
        .map(|(name, value)| {
            serde_json::json!({
                "name": String::from_utf8_lossy(name),
                "value": String::from_utf8_lossy(value),
            })
        })
        .collect()
}

#[cfg(feature = "acl")]
fn acl_json(acl: &PosixAcl) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    if let Some(access) = &acl.access {
        obj.insert("access".into(), access.to_string().into());
    }
    if let Some(default) = &acl.default {
        obj.insert("default".into(), default.to_string().into());
    }
    serde_json::Value::Object(obj)
}

fn format_time(ns: i64) -> String {
    let (secs, nsecs) = crate::fs::split_nanos(ns);
    match chrono::DateTime::from_timestamp(secs, nsecs) {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ns.to_string(),
    }
}
