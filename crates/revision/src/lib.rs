//! # Revision
//!
//! Immutable, content-addressed snapshots of a workload template.
//!
//! Anything that points at a [`Template`](resources::Template) implements
//! [`Referrer`]; a [`Publisher`] then resolves the template for it (required
//! overlays, elected overlays, caller patches, in that order), stores the
//! result as a [`Revision`](resources::Revision) named after its content,
//! elects the active revision and trims old ones.
//!
//! ## Example
//!
//! ```ignore
//! let publisher = Publisher::new(&store);
//! let active = publisher.elect_revision(&notebook)?;
//! let spec = active.pod_template_spec()?;
//! ```

mod error;
mod publisher;
mod referrer;

pub use error::{Error, Result};
pub use publisher::Publisher;
pub use referrer::Referrer;

/// Label naming the referrer that owns a revision
pub const LABEL_NAME: &str = "stencil.dev/name";

/// Annotation recording the template a revision was resolved from
pub const ANNOTATION_TEMPLATE: &str = "stencil.dev/template";
