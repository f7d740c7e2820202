use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::codec::CodecError;
use crate::identity::Uid;
use crate::status::Status;

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Errors surfaced by tracker operations. Every error is terminal for the
/// operation that produced it.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Task tracker not initialized at {} (run `tt init`)", path.display())]
    NotInitialized { path: PathBuf },

    #[error("Task tracker already initialized at {}", path.display())]
    AlreadyInitialized { path: PathBuf },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Corrupt record {}: {source}", path.display())]
    CorruptRecord {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("Cannot {action} {uid}: status is {from}")]
    InvalidTransition {
        uid: Uid,
        from: Status,
        action: &'static str,
    },

    #[error("Empty description")]
    EmptyDescription,

    #[error("{uid} is already assigned to {user}")]
    DuplicateAssignment { uid: Uid, user: String },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Unknown user `{0}` (run `tt register`)")]
    UnknownUser(String),

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TrackerError {
    /// Machine-readable SCREAMING_SNAKE code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotInitialized { .. } => "NOT_INITIALIZED",
            Self::AlreadyInitialized { .. } => "ALREADY_INITIALIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            Self::CorruptRecord { .. } => "CORRUPT_RECORD",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::EmptyDescription => "EMPTY_DESCRIPTION",
            Self::DuplicateAssignment { .. } => "DUPLICATE_ASSIGNMENT",
            Self::InvalidOperation(_) => "INVALID_OPERATION",
            Self::UnknownUser(_) => "UNKNOWN_USER",
            Self::Io { .. } => "IO_ERROR",
        }
    }

    /// Category-based process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::NotInitialized { .. }
            | Self::AlreadyInitialized { .. }
            | Self::CorruptRecord { .. } => 2,
            Self::NotFound(_) | Self::UnknownUser(_) => 3,
            Self::InvalidIdentifier(_) | Self::EmptyDescription => 4,
            Self::InvalidTransition { .. }
            | Self::DuplicateAssignment { .. }
            | Self::InvalidOperation(_) => 5,
            Self::Io { .. } => 8,
        }
    }

    pub(crate) fn corrupt(path: &Path, source: CodecError) -> Self {
        Self::CorruptRecord {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Attaches `path` to an I/O failure, for use with `map_err`.
pub(crate) fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> TrackerError {
    let path = path.to_path_buf();
    move |source| TrackerError::Io { path, source }
}
