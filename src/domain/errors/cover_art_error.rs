//! Cover art error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cover art error variants.
///
/// Values are cloneable so a single failed fetch can be handed to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum CoverArtError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("cover art not found: {message}")]
    NotFound { message: String },

    #[error("failed to decode image: {message}")]
    Decode { message: String },

    #[error("cache storage error: {message}")]
    Storage { message: String },
}

impl CoverArtError {
    /// Creates network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates server error.
    #[must_use]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Creates not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Returns the coarse error kind reported to observers.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } | Self::Server { .. } => ErrorKind::Network,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Storage { .. } => ErrorKind::Storage,
        }
    }

    /// Returns whether a later retry may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network)
    }
}

impl From<std::io::Error> for CoverArtError {
    fn from(e: std::io::Error) -> Self {
        Self::storage(e.to_string())
    }
}

/// Failure category carried by a failed load state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connectivity, timeout or server-side failure.
    Network,
    /// The entity has no artwork.
    NotFound,
    /// The server returned bytes that are not an image.
    Decode,
    /// Local disk failure.
    Storage,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::NotFound => write!(f, "not found"),
            Self::Decode => write!(f, "decode"),
            Self::Storage => write!(f, "storage"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(CoverArtError::network("timeout"), ErrorKind::Network, true ; "network")]
    #[test_case(CoverArtError::server(503, "busy"), ErrorKind::Network, true ; "server_is_network")]
    #[test_case(CoverArtError::not_found("no art"), ErrorKind::NotFound, false ; "not_found")]
    #[test_case(CoverArtError::decode("garbage"), ErrorKind::Decode, false ; "decode")]
    #[test_case(CoverArtError::storage("disk full"), ErrorKind::Storage, false ; "storage")]
    fn test_error_kind(error: CoverArtError, kind: ErrorKind, transient: bool) {
        assert_eq!(error.kind(), kind);
        assert_eq!(error.is_transient(), transient);
    }

    #[test]
    fn test_io_error_is_storage() {
        let err: CoverArtError = std::io::Error::other("boom").into();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
