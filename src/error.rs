// src/error.rs
//
// Error taxonomy shared by every backend, the filter compiler and the listing engine.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Every failure surfaced by bucketwalk.
///
/// `InvalidUri` and `InvalidFilter` are raised locally before any network
/// call. `Transient` is the only retried variant; the others are terminal.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("transient backend failure: {0}")]
    Transient(String),

    #[error("malformed backend response: {0}")]
    Malformed(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl StoreError {
    pub fn invalid_uri(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::InvalidUri {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Eligible for another attempt under the retry policy.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Short stable label, used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::InvalidUri { .. } => "invalid_uri",
            StoreError::InvalidFilter(_) => "invalid_filter",
            StoreError::NotFound(_) => "not_found",
            StoreError::AccessDenied(_) => "access_denied",
            StoreError::Transient(_) => "transient",
            StoreError::Malformed(_) => "malformed",
            StoreError::Cancelled => "cancelled",
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            // A path component that is a file means the key does not exist
            ErrorKind::NotFound | ErrorKind::NotADirectory | ErrorKind::IsADirectory => {
                StoreError::NotFound(err.to_string())
            }
            ErrorKind::PermissionDenied => StoreError::AccessDenied(err.to_string()),
            // Retrying cannot fix a path the OS refuses to interpret
            ErrorKind::InvalidInput | ErrorKind::InvalidData => StoreError::Malformed(err.to_string()),
            // Unknown IO failures get the benefit of the doubt
            _ => StoreError::Transient(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error_mapping() {
        let nf: StoreError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(nf.is_not_found());

        let denied: StoreError = io::Error::new(io::ErrorKind::PermissionDenied, "no").into();
        assert_eq!(denied.kind(), "access_denied");

        let timeout: StoreError = io::Error::new(io::ErrorKind::TimedOut, "slow disk").into();
        assert!(timeout.is_transient());

        let through_file: StoreError = io::Error::new(io::ErrorKind::NotADirectory, "enotdir").into();
        assert!(through_file.is_not_found());

        let nul: StoreError = io::Error::new(io::ErrorKind::InvalidInput, "nul byte").into();
        assert_eq!(nul.kind(), "malformed");
    }

    #[test]
    fn test_invalid_uri_display() {
        let err = StoreError::invalid_uri("ftp://x", "unsupported scheme 'ftp'");
        assert_eq!(err.to_string(), "invalid URI 'ftp://x': unsupported scheme 'ftp'");
        assert!(!err.is_transient());
    }
}
