//! # Resources
//!
//! Typed views of the objects stencil keeps in its store.
//!
//! - [`Dag`] and [`Execution`]: a task graph and one run of it
//! - [`Template`] and [`PodDefault`]: a base workload plus reusable overlays
//! - [`Revision`]: an immutable, content-addressed snapshot of a resolved template
//! - [`Notebook`]: a long-running workload that tracks revisions of its template
//! - [`Job`] and [`Pod`]: the units of work the controllers create
//!
//! Every kind implements [`objstore::Object`], so it can be read and written
//! through [`objstore::StoreExt`].

mod dag;
mod error;
mod notebook;
mod pod;
mod revision;
mod template;

pub use dag::{Dag, DagSpec, DagTask, Execution, ExecutionSpec, ExecutionStatus, TaskStatus, validate_dag};
pub use error::{Error, Result};
pub use notebook::{
    Notebook, NotebookRevision, NotebookSpec, NotebookStatus, PHASE_RUNNING, PHASE_STOPPED, Subject,
};
pub use pod::{
    Condition, Container, Job, JobSpec, JobStatus, Pod, PodSpec, PodStatus, PodTemplateSpec,
    ResourceList, ResourceRequirements, TemplateMeta,
};
pub use revision::{HASH_LEN, Revision, RevisionSpec, RevisionStatus};
pub use template::{
    DependencyReference, OptionReference, PodDefault, PodDefaultSpec, Template, TemplateOption,
    TemplateReference, TemplateSpec, UpdatePolicy,
};

/// Default run parallelism when unset
pub const DEFAULT_PARALLELISM: usize = 20;

macro_rules! impl_object {
    ($($ty:ty => $kind:literal),* $(,)?) => {
        $(
            impl objstore::Object for $ty {
                const KIND: &'static str = $kind;

                fn meta(&self) -> &objstore::ObjectMeta {
                    &self.metadata
                }

                fn meta_mut(&mut self) -> &mut objstore::ObjectMeta {
                    &mut self.metadata
                }
            }
        )*
    };
}

impl_object! {
    Dag => "Dag",
    Execution => "Execution",
    Template => "Template",
    PodDefault => "PodDefault",
    Revision => "Revision",
    Notebook => "Notebook",
    Job => "Job",
    Pod => "Pod",
}
