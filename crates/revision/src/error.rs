//! Error types for revision management

use objstore::{ErrorCategory, ObjectKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A referrer elected an option its template does not offer
    #[error("the referenced option was not found in the template spec: {option} (template {template})")]
    OptionNotFound { option: String, template: ObjectKey },

    /// Store operation failed
    #[error(transparent)]
    Store(#[from] objstore::Error),

    /// Template resolution failed
    #[error(transparent)]
    Resource(#[from] resources::Error),
}

impl Error {
    /// Store classification, if this came from the store
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Store(e) => Some(e.category()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.category() == Some(ErrorCategory::NotFound)
    }

    pub fn is_conflict(&self) -> bool {
        self.category() == Some(ErrorCategory::Conflict)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
