//! The capability shared by everything that owns revisions

use objstore::{Object, ObjectKey, OwnerReference};
use resources::{Notebook, OptionReference, ResourceList, UpdatePolicy};

/// A workload that points at a template and can have revisions
pub trait Referrer {
    fn name(&self) -> &str;

    fn namespace(&self) -> &str;

    fn template_ref(&self) -> ObjectKey;

    /// Revisions to keep when trimming
    fn history_limit(&self) -> i64;

    /// Requests applied to the template's first container
    fn resource_requests(&self) -> &ResourceList;

    fn elected_options(&self) -> Vec<OptionReference>;

    fn update_policy(&self) -> UpdatePolicy;

    /// Controller owner stamped on revisions, when the referrer is stored
    fn owner_reference(&self) -> Option<OwnerReference> {
        None
    }
}

impl Referrer for Notebook {
    fn name(&self) -> &str {
        &self.metadata.name
    }

    fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    fn template_ref(&self) -> ObjectKey {
        self.template_key()
    }

    fn history_limit(&self) -> i64 {
        self.spec.revision_history_limit
    }

    fn resource_requests(&self) -> &ResourceList {
        &self.spec.resources
    }

    fn elected_options(&self) -> Vec<OptionReference> {
        Notebook::elected_options(self)
    }

    fn update_policy(&self) -> UpdatePolicy {
        Notebook::update_policy(self)
    }

    fn owner_reference(&self) -> Option<OwnerReference> {
        Some(Object::owner_reference(self))
    }
}
