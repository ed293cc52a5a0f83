use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntoExtractPathError {
    /// The path contains a `..` component, or is still absolute after
    /// leading separators were stripped.
    Risky(Vec<u8>),
}

impl core::error::Error for IntoExtractPathError {}

impl fmt::Display for IntoExtractPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntoExtractPathError::Risky(path) => write!(
                f,
                "{}: '{}'",
                self.as_str(),
                String::from_utf8_lossy(path)
            ),
        }
    }
}

impl IntoExtractPathError {
    pub fn as_str(&self) -> &str {
        match self {
            IntoExtractPathError::Risky(_) => "path could escape the extraction directory",
        }
    }

    pub fn as_io_error(&self) -> std::io::Error {
        use std::io::{Error, ErrorKind};
        Error::new(ErrorKind::InvalidInput, self.to_string())
    }
}

impl From<IntoExtractPathError> for std::io::Error {
    fn from(err: IntoExtractPathError) -> Self {
        err.as_io_error()
    }
}
