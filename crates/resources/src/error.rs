//! Error types for resource handling

use thiserror::Error;

/// Errors from resource manipulation and validation
#[derive(Debug, Error)]
pub enum Error {
    /// Overlay could not be merged
    #[error("merge failed: {0}")]
    Merge(#[from] overlay::Error),

    /// JSON (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Task graph declares the same task twice
    #[error("dag {dag}: duplicate task name {task:?}")]
    DuplicateTask { dag: String, task: String },

    /// Task graph has a task without a name
    #[error("dag {dag}: task at position {position} has no name")]
    UnnamedTask { dag: String, position: usize },
}

/// Result type for resource operations
pub type Result<T> = std::result::Result<T, Error>;
