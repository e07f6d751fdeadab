//! Error types for room registration.

use std::path::PathBuf;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers.
///
/// Too few landmarks for automatic positioning is not an error at the engine level:
/// [`crate::find_best_alignment`] returns `Ok(None)` instead. Malformed persisted entries are
/// skipped with a warning rather than failing the whole load.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading or writing a floor document failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A floor document or config file is not valid JSON of the expected shape.
    #[error("Parse error in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Registration configuration rejected by validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No record exists for the named room.
    #[error("Unknown room: {0}")]
    UnknownRoom(String),

    /// A manual adjustment was attempted while automatic positioning is running.
    #[error("Room {0} is being auto-positioned; manual adjustment is disabled")]
    SessionBusy(String),

    /// Automatic positioning found no usable cluster pair.
    #[error("Unable to auto-position room {0}; use manual positioning")]
    AutoPositionUnavailable(String),

    /// The background alignment task panicked or was cancelled.
    #[error("Alignment task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }

    /// True when the error is a missing file rather than a real I/O failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
