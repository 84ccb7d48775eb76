//! Error types for bndl

use crate::exit_codes::{
    EXIT_BUILD_ERROR, EXIT_CONFIG_ERROR, EXIT_INVALID_ARGS, EXIT_IO_ERROR, EXIT_UNPACK_ERROR,
};
use std::fmt;
use std::path::PathBuf;

/// Main error type for bndl operations
#[derive(Debug)]
pub enum BndlError {
    /// IO error while reading a source or writing a destination
    IoError(std::io::Error),

    /// An OCI layout was found but its index, manifest or config is unusable
    InvalidLayout(String),

    /// A blob's content does not hash to the digest that references it
    DigestMismatch { digest: String, actual: String },

    /// Image metadata is present but cannot be interpreted
    InvalidMetadata(String),

    /// Image source entry that cannot be unpacked (symlink, device, escaping path)
    UnsupportedEntry(PathBuf),

    /// Invalid caller-supplied argument
    InvalidArgument(String),

    /// Generic error with message
    Generic(String),
}

impl BndlError {
    /// Shorthand for an [`BndlError::InvalidLayout`] error
    pub fn invalid_layout<S: Into<String>>(msg: S) -> Self {
        BndlError::InvalidLayout(msg.into())
    }

    /// Process exit code the CLI reports for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            BndlError::IoError(_) => EXIT_IO_ERROR,
            BndlError::InvalidLayout(_) | BndlError::InvalidMetadata(_) => EXIT_CONFIG_ERROR,
            BndlError::DigestMismatch { .. } | BndlError::UnsupportedEntry(_) => EXIT_UNPACK_ERROR,
            BndlError::InvalidArgument(_) => EXIT_INVALID_ARGS,
            BndlError::Generic(_) => EXIT_BUILD_ERROR,
        }
    }
}

impl fmt::Display for BndlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BndlError::IoError(err) => write!(f, "IO error: {err}"),
            BndlError::InvalidLayout(msg) => write!(f, "Invalid OCI layout: {msg}"),
            BndlError::DigestMismatch { digest, actual } => {
                write!(f, "Digest mismatch: expected {digest}, got {actual}")
            }
            BndlError::InvalidMetadata(msg) => write!(f, "Invalid image metadata: {msg}"),
            BndlError::UnsupportedEntry(path) => {
                write!(f, "Unsupported image entry: {}", path.display())
            }
            BndlError::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            BndlError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for BndlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BndlError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BndlError {
    fn from(err: std::io::Error) -> Self {
        BndlError::IoError(err)
    }
}

impl From<glob::PatternError> for BndlError {
    fn from(err: glob::PatternError) -> Self {
        BndlError::Generic(format!("Invalid walk pattern: {err}"))
    }
}

impl From<glob::GlobError> for BndlError {
    fn from(err: glob::GlobError) -> Self {
        BndlError::IoError(err.into_error())
    }
}

impl From<anyhow::Error> for BndlError {
    fn from(err: anyhow::Error) -> Self {
        BndlError::Generic(format!("{err:#}"))
    }
}

/// Result type for bndl operations
pub type Result<T> = std::result::Result<T, BndlError>;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let io = BndlError::from(std::io::Error::other("disk full"));
        assert_eq!(io.exit_code(), EXIT_IO_ERROR);
        assert_eq!(BndlError::invalid_layout("no index").exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(
            BndlError::UnsupportedEntry(PathBuf::from("link")).exit_code(),
            EXIT_UNPACK_ERROR
        );
        assert_eq!(
            BndlError::from(anyhow::anyhow!("boom")).exit_code(),
            EXIT_BUILD_ERROR
        );
    }
}
