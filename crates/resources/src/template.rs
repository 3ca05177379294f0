//! Templates, overlay fragments and the references between them

use crate::pod::PodTemplateSpec;
use objstore::{ObjectKey, ObjectMeta};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a referrer follows changes to its template
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdatePolicy {
    /// Re-resolve the template on every election
    Auto,
    /// Keep the elected revision until told otherwise
    #[default]
    Ignore,
}

impl fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "Auto"),
            Self::Ignore => write!(f, "Ignore"),
        }
    }
}

/// Namespaced reference to a [`Template`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateReference {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

impl TemplateReference {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }
}

/// Reference to a [`PodDefault`] in the template's namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OptionReference {
    pub name: String,
}

impl OptionReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// An auxiliary object (e.g. credentials) that must accompany a revision
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyReference {
    #[serde(default)]
    pub api_version: String,
    pub kind: String,
    pub name: String,
}

/// An entry of a template's option catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateOption {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<TemplateOption>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<OptionReference>,
    pub template: PodTemplateSpec,
}

/// A base workload plus its catalog of overlays
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub metadata: ObjectMeta,
    pub spec: TemplateSpec,
}

impl Template {
    /// Whether the option catalog offers `name`
    pub fn has_option(&self, name: &str) -> bool {
        self.spec.options.iter().any(|o| o.name == name)
    }

    pub fn pod_template_spec(&self) -> PodTemplateSpec {
        self.spec.template.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodDefaultSpec {
    pub template: PodTemplateSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyReference>,
}

/// A named, reusable patch to a workload template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodDefault {
    pub metadata: ObjectMeta,
    pub spec: PodDefaultSpec,
}
