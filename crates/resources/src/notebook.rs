//! Long-running notebook workloads

use crate::pod::{Condition, ResourceList};
use crate::template::{OptionReference, TemplateReference, UpdatePolicy};
use chrono::{DateTime, Utc};
use objstore::{ObjectKey, ObjectMeta};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PHASE_RUNNING: &str = "Running";
pub const PHASE_STOPPED: &str = "Stopped";

const fn default_history_limit() -> i64 {
    3
}

/// The user a notebook belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(default)]
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookSpec {
    #[serde(default = "default_history_limit")]
    pub revision_history_limit: i64,
    #[serde(default)]
    pub stopped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_policy: Option<UpdatePolicy>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: ResourceList,
    pub template_ref: TemplateReference,
    #[serde(default)]
    pub owner: Subject,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl Default for NotebookSpec {
    fn default() -> Self {
        Self {
            revision_history_limit: default_history_limit(),
            stopped: false,
            update_policy: None,
            resources: ResourceList::new(),
            template_ref: TemplateReference::default(),
            owner: Subject::default(),
            options: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookRevision {
    pub name: String,
    pub elected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub revisions: Vec<NotebookRevision>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notebook {
    pub metadata: ObjectMeta,
    pub spec: NotebookSpec,
    #[serde(default)]
    pub status: NotebookStatus,
}

impl Notebook {
    pub fn is_stopped(&self) -> bool {
        self.spec.stopped
    }

    /// The template, defaulting its namespace to the notebook's own
    pub fn template_key(&self) -> ObjectKey {
        let namespace = if self.spec.template_ref.namespace.is_empty() {
            &self.metadata.namespace
        } else {
            &self.spec.template_ref.namespace
        };
        ObjectKey::new(namespace, &self.spec.template_ref.name)
    }

    pub fn elected_options(&self) -> Vec<OptionReference> {
        self.spec.options.iter().map(OptionReference::new).collect()
    }

    /// Update policy; unset behaves as `Ignore`
    pub fn update_policy(&self) -> UpdatePolicy {
        self.spec.update_policy.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_from_manifest() {
        let nb: Notebook = serde_json::from_value(json!({
            "metadata": {"name": "nb", "namespace": "alice"},
            "spec": {"templateRef": {"name": "jupyter"}, "options": ["gpu"]}
        }))
        .unwrap();

        assert_eq!(nb.spec.revision_history_limit, 3);
        assert_eq!(nb.update_policy(), UpdatePolicy::Ignore);
        assert_eq!(nb.template_key(), ObjectKey::new("alice", "jupyter"));
        assert_eq!(nb.elected_options(), vec![OptionReference::new("gpu")]);
    }

    #[test]
    fn test_explicit_template_namespace() {
        let mut nb = Notebook::default();
        nb.metadata.namespace = "alice".into();
        nb.spec.template_ref = TemplateReference {
            name: "jupyter".into(),
            namespace: "stencil-system".into(),
        };
        assert_eq!(nb.template_key().namespace, "stencil-system");
    }
}
