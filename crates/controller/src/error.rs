//! Error types for reconciliation

use objstore::ErrorCategory;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Store operation failed
    #[error(transparent)]
    Store(#[from] objstore::Error),

    /// Revision could not be created or elected
    #[error(transparent)]
    Revision(#[from] revision::Error),

    /// A resource could not be decoded or merged
    #[error(transparent)]
    Resource(#[from] resources::Error),

    /// The graph's entrypoint names no task
    #[error("dag {dag}: entrypoint {entrypoint:?} is not a task")]
    MissingEntrypoint { dag: String, entrypoint: String },

    /// A task depends on a task the graph does not declare
    #[error("dag {dag}: task {task:?} depends on unknown task {dependency:?}")]
    UnknownDependency {
        dag: String,
        task: String,
        dependency: String,
    },

    /// Following dependencies leads back to a task already being visited
    #[error("dag {dag}: dependency cycle through task {task:?}")]
    DependencyCycle { dag: String, task: String },

    /// The dispatcher's worker pool could not be built
    #[error("failed to create thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// Store classification, if a store call failed
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Store(e) => Some(e.category()),
            Self::Revision(e) => e.category(),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.category() == Some(ErrorCategory::Conflict)
    }

    /// Whether the graph itself is malformed
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingEntrypoint { .. }
                | Self::UnknownDependency { .. }
                | Self::DependencyCycle { .. }
                | Self::Revision(revision::Error::OptionNotFound { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
