//! Pod templates and the units of work built from them

use crate::error::Result;
use chrono::{DateTime, Utc};
use objstore::ObjectMeta;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Resource quantities keyed by resource name, e.g. `cpu = "500m"`
pub type ResourceList = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: ResourceList,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: ResourceList,
}

impl ResourceRequirements {
    fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.limits.is_empty()
    }
}

/// A container in a pod spec
///
/// Fields stencil reads are typed; everything else is carried through
/// untouched in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "ResourceRequirements::is_empty")]
    pub resources: ResourceRequirements,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<Container>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Labels and annotations carried by a pod template
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMeta {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl TemplateMeta {
    fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.annotations.is_empty()
    }
}

/// A workload template: pod metadata plus a pod spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodTemplateSpec {
    #[serde(default, skip_serializing_if = "TemplateMeta::is_empty")]
    pub metadata: TemplateMeta,
    #[serde(default)]
    pub spec: PodSpec,
}

impl PodTemplateSpec {
    /// Strategic-merge `other` into this template.
    ///
    /// On error `self` is left unchanged.
    pub fn strategic_merge_from(&mut self, other: &Self) -> Result<()> {
        let into = serde_json::to_value(&*self)?;
        let from = serde_json::to_value(other)?;
        let merged = overlay::merge(&into, &from)?;
        *self = serde_json::from_value(merged)?;
        Ok(())
    }

    /// Merge several specs over this one, in order.
    pub fn strategic_merge_all(&mut self, others: &[Self]) -> Result<()> {
        if others.is_empty() {
            return Ok(());
        }
        let into = serde_json::to_value(&*self)?;
        let from = others
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let merged = overlay::merge_all(&into, &from)?;
        *self = serde_json::from_value(merged)?;
        Ok(())
    }

    /// Overlay resource requests onto the first container.
    pub fn set_resource_requests(&mut self, requests: &ResourceList) {
        let Some(container) = self.spec.containers.first_mut() else {
            return;
        };
        container
            .resources
            .requests
            .extend(requests.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Canonical JSON encoding: sorted keys, pretty printed
    pub fn to_canonical_json(&self) -> Result<String> {
        // Value maps are ordered, which sorts struct fields and extras alike
        let value = serde_json::to_value(self)?;
        Ok(serde_json::to_string_pretty(&value)?)
    }

    /// Template that only sets the restart policy
    pub fn restart_policy(policy: &str) -> Self {
        Self {
            spec: PodSpec {
                restart_policy: Some(policy.to_string()),
                ..PodSpec::default()
            },
            ..Self::default()
        }
    }

    /// Template that only overrides the command of one container
    pub fn command(container: &str, command: &[String]) -> Self {
        Self {
            spec: PodSpec {
                containers: vec![Container {
                    name: container.to_string(),
                    command: command.to_vec(),
                    ..Container::default()
                }],
                ..PodSpec::default()
            },
            ..Self::default()
        }
    }
}

/// A status condition as reported by jobs and pods
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    pub fn new(type_: &str, reason: &str) -> Self {
        Self {
            type_: type_.to_string(),
            status: "True".to_string(),
            reason: reason.to_string(),
            message: String::new(),
            last_transition_time: Some(Utc::now()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub template: PodTemplateSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completions: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub succeeded: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default)]
    pub active: u32,
}

/// An externally scheduled unit of work
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub metadata: ObjectMeta,
    pub spec: JobSpec,
    #[serde(default)]
    pub status: JobStatus,
}

impl Job {
    pub fn is_complete(&self) -> bool {
        self.status.completion_time.is_some()
    }

    pub fn is_failed(&self) -> bool {
        self.status.failed > 0
    }

    /// Created and not yet finished
    pub fn is_active(&self) -> bool {
        !self.is_complete() && !self.is_failed()
    }

    /// Record a successful completion, as the scheduler would.
    pub fn mark_succeeded(&mut self) {
        let now = Utc::now();
        self.status.active = 0;
        self.status.succeeded = 1;
        self.status.completion_time = Some(now);
        self.status.conditions.push(Condition::new("Complete", "Completed"));
    }

    /// Record a failure; a failed job gets no completion time.
    pub fn mark_failed(&mut self, reason: &str) {
        self.status.active = 0;
        self.status.failed += 1;
        self.status.conditions.push(Condition::new("Failed", reason));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phase: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pod {
    pub metadata: ObjectMeta,
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
}
