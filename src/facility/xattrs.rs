use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use super::Facility;
use crate::attrs::is_acl_xattr;
use crate::error::SoftError;
use crate::fs::{FileKind, is_unsupported};

/// Extended attributes as (namespace-qualified name, value) pairs, sorted by
/// name. The ACL attributes are never part of the list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct XattrList(pub Vec<(Vec<u8>, Vec<u8>)>);

impl XattrList {
    pub fn get(&self, name: &[u8]) -> Option<&[u8]> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &[u8]> {
        self.0.iter().map(|(n, _)| n.as_slice())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn read_error(path: &Path, source: std::io::Error) -> SoftError {
    SoftError::ReadXattr {
        path: path.to_path_buf(),
        source,
    }
}

impl Facility for XattrList {
    const NAME: &'static str = "xattr";

    fn supported() -> bool {
        ::xattr::SUPPORTED_PLATFORM
    }

    fn capture(path: &Path, _kind: FileKind) -> Result<Option<Self>, SoftError> {
        let names = match ::xattr::list(path) {
            Ok(names) => names,
            Err(e) if is_unsupported(&e) => return Ok(None),
            Err(e) => return Err(read_error(path, e)),
        };

        let mut attrs = Vec::new();
        for name in names.filter(|n| !is_acl_xattr(n.as_bytes())) {
            match ::xattr::get(path, &name) {
                Ok(Some(value)) => attrs.push((name.as_bytes().to_vec(), value)),
                // Removed between list and get.
                Ok(None) => {}
                Err(e) => return Err(read_error(path, e)),
            }
        }

        if attrs.is_empty() {
            return Ok(None);
        }

        attrs.sort();
        Ok(Some(XattrList(attrs)))
    }

    /// Converge the live attribute set onto this list: every recorded
    /// attribute is written, then every live attribute not in the list is
    /// removed.
    fn apply(&self, path: &Path, _kind: FileKind) -> Vec<SoftError> {
        let mut errors = Vec::new();

        if self.is_empty() {
            return errors;
        }

        let existing: Vec<_> = match ::xattr::list(path) {
            Ok(names) => names.collect(),
            Err(e) => {
                errors.push(read_error(path, e));
                Vec::new()
            }
        };

        for (name, value) in &self.0 {
            if let Err(source) = ::xattr::set(path, OsStr::from_bytes(name), value) {
                errors.push(SoftError::XattrSet {
                    name: String::from_utf8_lossy(name).into_owned(),
                    path: path.to_path_buf(),
                    source,
                });
            }
        }

        for name in existing {
            let bytes = name.as_bytes();
            if is_acl_xattr(bytes) || self.get(bytes).is_some() {
                continue;
            }
            tracing::trace!(path = %path.display(), name = ?name, "removing stale xattr");
            if let Err(source) = ::xattr::remove(path, &name) {
                errors.push(SoftError::XattrRemove {
                    name: name.to_string_lossy().into_owned(),
                    path: path.to_path_buf(),
                    source,
                });
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_xattrs_supported(path: &Path) -> bool {
        ::xattr::set(path, "user.hoard-check", b"1").is_ok()
            && ::xattr::remove(path, "user.hoard-check").is_ok()
    }

    #[test]
    fn lookup() {
        let list = XattrList(vec![
            (b"user.a".to_vec(), b"1".to_vec()),
            (b"user.b".to_vec(), b"2".to_vec()),
        ]);
        assert_eq!(list.get(b"user.b"), Some(&b"2"[..]));
        assert_eq!(list.get(b"user.c"), None);
        assert_eq!(list.names().collect::<Vec<_>>(), vec![&b"user.a"[..], &b"user.b"[..]]);
    }

    fn user_attrs(path: &Path) -> XattrList {
        let mut live = XattrList::capture(path, FileKind::Regular)
            .unwrap()
            .unwrap_or_default();
        live.0.retain(|(name, _)| name.starts_with(b"user."));
        live
    }

    #[test]
    fn converges_onto_recorded_set() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"").unwrap();
        if !user_xattrs_supported(&path) {
            return;
        }

        ::xattr::set(&path, "user.foo", b"bar").unwrap();
        let recorded = XattrList::capture(&path, FileKind::Regular).unwrap().unwrap();
        assert_eq!(recorded.get(b"user.foo"), Some(&b"bar"[..]));

        ::xattr::set(&path, "user.baz", b"bax").unwrap();
        ::xattr::set(&path, "user.foo", b"baz").unwrap();
        let errors = recorded.apply(&path, FileKind::Regular);
        assert!(
            errors.iter().all(|e| !e.to_string().contains("'user.")),
            "{:?}",
            errors
        );

        assert_eq!(
            user_attrs(&path),
            XattrList(vec![(b"user.foo".to_vec(), b"bar".to_vec())])
        );
    }

    #[test]
    fn empty_list_is_a_no_op() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"").unwrap();
        if !user_xattrs_supported(&path) {
            return;
        }

        ::xattr::set(&path, "user.keep", b"1").unwrap();
        assert!(XattrList::default().apply(&path, FileKind::Regular).is_empty());
        assert_eq!(::xattr::get(&path, "user.keep").unwrap(), Some(b"1".to_vec()));
    }
}
