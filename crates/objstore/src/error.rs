//! Error types for object store operations.
//!
//! Every failure is classified so callers can decide between "create it",
//! "already done", "re-reconcile later" and "give up".

use crate::meta::ObjectKey;
use thiserror::Error;

/// Classification of store errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The object does not exist (yet)
    NotFound,
    /// An object with the same identity already exists
    AlreadyExists,
    /// The stored object changed since it was read
    Conflict,
    /// The caller may not perform this operation
    Forbidden,
    /// The request itself is malformed
    Invalid,
    /// Backend failure (database, serialization, poisoned lock)
    Backend,
}

impl ErrorCategory {
    /// Whether re-running the reconciliation is expected to help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict | Self::Backend)
    }

    /// Whether an idempotent create can treat this as success.
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::AlreadyExists)
    }
}

/// Errors returned by an [`ObjectStore`](crate::ObjectStore).
#[derive(Debug, Error)]
pub enum Error {
    /// No object with this identity exists
    #[error("{kind} {key} not found")]
    NotFound {
        /// Kind of the missing object
        kind: String,
        /// Namespace and name of the missing object
        key: ObjectKey,
    },

    /// An object with this identity already exists
    #[error("{kind} {key} already exists")]
    AlreadyExists {
        /// Kind of the existing object
        kind: String,
        /// Namespace and name of the existing object
        key: ObjectKey,
    },

    /// The object was modified since the caller read it
    #[error("conflict on {kind} {key}: expected version {expected}, found {found}")]
    Conflict {
        /// Kind of the conflicting object
        kind: String,
        /// Namespace and name of the conflicting object
        key: ObjectKey,
        /// Resource version the caller based its change on
        expected: String,
        /// Resource version currently stored
        found: String,
    },

    /// The operation is not permitted
    #[error("forbidden: cannot {verb} {kind}")]
    Forbidden {
        /// Operation that was denied (get, list, create, patch, delete)
        verb: &'static str,
        /// Kind the operation targeted
        kind: String,
    },

    /// The object is malformed
    #[error("invalid object: {0}")]
    Invalid(String),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A previous holder of the store lock panicked
    #[error("store lock poisoned")]
    Poisoned,
}

impl Error {
    /// Categorize this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } => ErrorCategory::AlreadyExists,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Forbidden { .. } => ErrorCategory::Forbidden,
            Self::Invalid(_) => ErrorCategory::Invalid,
            Self::Database(_) | Self::Io(_) | Self::Serialization(_) | Self::Poisoned => {
                ErrorCategory::Backend
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    pub fn is_already_exists(&self) -> bool {
        self.category() == ErrorCategory::AlreadyExists
    }

    pub fn is_conflict(&self) -> bool {
        self.category() == ErrorCategory::Conflict
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// Result type for object store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Helpers for the two "expected" store errors.
pub trait ResultExt<T> {
    /// Map `NotFound` to `Ok(None)`.
    fn ignore_not_found(self) -> Result<Option<T>>;

    /// Map `AlreadyExists` to `Ok(None)`.
    fn ignore_already_exists(self) -> Result<Option<T>>;
}

impl<T> ResultExt<T> for Result<T> {
    fn ignore_not_found(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn ignore_already_exists(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.category().is_ignorable() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
