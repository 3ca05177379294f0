//! # Controller
//!
//! Level-triggered reconciliation of stencil resources.
//!
//! ## Core Concepts
//!
//! - **Reconciler**: converges one kind of object, one identity at a time
//! - **Action**: what a reconciler wants next: nothing, or another look later
//! - **ExecutionReconciler**: runs a task graph with bounded concurrency,
//!   one Job per task
//! - **NotebookReconciler**: keeps a notebook's pod on its elected revision
//! - **Dispatcher**: reconciles every identity in parallel, with backoff
//!   after errors
//!
//! Reconcilers keep no state between calls. Everything they know comes
//! from the store, so running them again is always safe.
//!
//! ## Example
//!
//! ```ignore
//! use controller::{Dispatcher, DispatchOptions, ExecutionReconciler, Reconciler};
//!
//! let runs = ExecutionReconciler::new(&store);
//! let dispatcher = Dispatcher::new(DispatchOptions::default())?;
//! let summary = dispatcher.pass(&[&runs as &dyn Reconciler])?;
//! println!("{} reconciled, {} failed", summary.reconciled, summary.failed.len());
//! ```

pub mod dispatch;
pub mod error;
pub mod execution;
pub mod notebook;
pub mod plan;
pub mod reconciler;
pub mod task;
pub mod types;

pub use dispatch::{DispatchOptions, Dispatcher, PassSummary};
pub use error::{Error, Result};
pub use execution::{ExecutionReconciler, LABEL_EXECUTION, LABEL_TASK};
pub use notebook::{ANNOTATION_OWNER, LABEL_NOTEBOOK_NAME, LABEL_REVISION, NotebookReconciler};
pub use plan::dependency_order;
pub use reconciler::Reconciler;
pub use task::{NamespacedTask, command_patch, restart_patch};
pub use types::{Action, Backoff, DEFAULT_REQUEUE};
