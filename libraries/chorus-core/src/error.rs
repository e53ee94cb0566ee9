//! Error types for the Chorus bindings

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the Chorus bindings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A released or null native handle was used
    #[error("invalid or released native handle")]
    Handle,

    /// The container's flat entry sequence is malformed
    #[error(transparent)]
    Structure(#[from] StructureError),

    /// The native library reported a failure code
    #[error("native call failed: {0}")]
    NativeCall(NativeError),

    /// A link string could not be parsed
    #[error("malformed link: {0}")]
    Link(String),
}

impl From<NativeError> for Error {
    fn from(code: NativeError) -> Self {
        Self::NativeCall(code)
    }
}

/// Malformed folder boundary markers in a container's flat entry sequence.
///
/// A structure error aborts the whole reconstruction; no partial tree is ever
/// returned.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureError {
    /// A folder end marker appeared with no folder open
    #[error("folder end {id} at position {index} has no matching start")]
    UnexpectedFolderEnd {
        /// Folder id carried by the end marker
        id: u64,
        /// Position of the marker in the flat sequence
        index: usize,
    },

    /// A folder end marker closed a different folder than the innermost open one
    #[error("folder end at position {index} closes folder {found}, expected {expected}")]
    MismatchedFolderEnd {
        /// Id of the innermost open folder
        expected: u64,
        /// Id carried by the end marker
        found: u64,
        /// Position of the marker in the flat sequence
        index: usize,
    },

    /// A folder start marker was never closed
    #[error("folder {id} is never closed")]
    UnterminatedFolder {
        /// Id of the folder left open at the end of the sequence
        id: u64,
    },
}

/// Failure codes reported by the native library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeError {
    /// Login failed because of bad credentials
    BadCredentials,
    /// The caller lacks permission for the operation
    PermissionDenied,
    /// A position argument was out of range
    IndexOutOfRange,
    /// An argument was rejected by the native library
    InvalidIndata,
    /// The object is still loading
    IsLoading,
    /// Networking has been disabled
    NetworkDisabled,
    /// A transient failure; the native library retries internally
    OtherTransient,
    /// A permanent failure
    OtherPermanent,
}

impl NativeError {
    /// Short failure description, matching the native library's error text
    pub fn as_str(&self) -> &'static str {
        match self {
            NativeError::BadCredentials => "bad username or password",
            NativeError::PermissionDenied => "permission denied",
            NativeError::IndexOutOfRange => "index out of range",
            NativeError::InvalidIndata => "invalid argument",
            NativeError::IsLoading => "object is still loading",
            NativeError::NetworkDisabled => "network disabled",
            NativeError::OtherTransient => "transient failure",
            NativeError::OtherPermanent => "permanent failure",
        }
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_error_converts_to_error() {
        let err: Error = StructureError::UnterminatedFolder { id: 7 }.into();
        assert_eq!(
            err,
            Error::Structure(StructureError::UnterminatedFolder { id: 7 })
        );
    }

    #[test]
    fn native_error_display() {
        let err = Error::NativeCall(NativeError::BadCredentials);
        assert_eq!(err.to_string(), "native call failed: bad username or password");
    }
}
