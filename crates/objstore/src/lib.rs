//! # Objstore
//!
//! The object store seen by the reconcilers: namespaced get, label-filtered
//! list, create, patch and delete, each failure classified as not-found,
//! already-exists, conflict or forbidden.
//!
//! ## Backends
//!
//! - [`MemoryStore`]: in-process, used by tests
//! - [`SqliteStore`]: a single database file, used by the CLI
//!
//! ## Example
//!
//! ```
//! use objstore::{MemoryStore, ObjectMeta, ObjectStore, RawObject};
//!
//! let store = MemoryStore::new();
//! let created = store.create(RawObject::new("Dag", ObjectMeta::new("test", "dag1")))?;
//! assert!(!created.metadata.uid.is_empty());
//!
//! // creating it again is classified, not fatal
//! let err = store.create(RawObject::new("Dag", ObjectMeta::new("test", "dag1"))).unwrap_err();
//! assert!(err.is_already_exists());
//! # Ok::<(), objstore::Error>(())
//! ```
//!
//! Optimistic concurrency: [`ObjectStore::patch`] takes the object as it was
//! read plus the modified copy, and fails with `Conflict` when someone else
//! wrote in between. Callers do not retry in place; they let the dispatcher
//! re-reconcile.

mod error;
mod gc;
mod memory;
mod meta;
mod sqlite;
mod store;

pub use error::{Error, ErrorCategory, Result, ResultExt};
pub use gc::{Collected, collect_garbage};
pub use memory::MemoryStore;
pub use meta::{API_VERSION, ListParams, Object, ObjectKey, ObjectMeta, OwnerReference, RawObject};
pub use sqlite::SqliteStore;
pub use store::{ObjectStore, StoreExt, merge_patch_apply, merge_patch_diff};
