//! Object identity and metadata shared by every stored kind

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// API version stamped on every typed object
pub const API_VERSION: &str = "stencil.dev/v1beta1";

/// Namespace and name of an object
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// A link from a dependent object to the object that owns it
///
/// Owner references drive cascading deletion: see [`collect_garbage`](crate::collect_garbage).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
    #[serde(default)]
    pub controller: bool,
    #[serde(default)]
    pub block_owner_deletion: bool,
}

/// Metadata carried by every stored object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub generate_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    /// Clear everything the store assigns so the object can be created anew
    /// under a different identity.
    pub fn reset_lineage(&mut self) {
        self.uid.clear();
        self.resource_version.clear();
        self.generate_name.clear();
        self.creation_timestamp = None;
        self.deletion_timestamp = None;
        self.finalizers.clear();
    }

    /// Add an owner, replacing any existing reference with the same uid.
    pub fn add_owner(&mut self, owner: OwnerReference) {
        self.owner_references
            .retain(|r| r.uid.is_empty() || r.uid != owner.uid);
        self.owner_references.push(owner);
    }
}

/// An untyped stored object: kind, metadata and an arbitrary JSON body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawObject {
    pub kind: String,
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl RawObject {
    pub fn new(kind: impl Into<String>, metadata: ObjectMeta) -> Self {
        Self {
            kind: kind.into(),
            api_version: API_VERSION.to_string(),
            metadata,
            body: Map::new(),
        }
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let raw: Self = serde_json::from_value(value)?;
        if raw.kind.is_empty() {
            return Err(Error::Invalid("object has no kind".into()));
        }
        Ok(raw)
    }

    /// Reference to this object for use in a dependent's owner list.
    pub fn owner_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            name: self.metadata.name.clone(),
            uid: self.metadata.uid.clone(),
            controller: true,
            block_owner_deletion: true,
        }
    }
}

/// A typed object kind that can live in the store
pub trait Object: Serialize + DeserializeOwned + Clone {
    /// Kind name, e.g. `"Revision"`
    const KIND: &'static str;

    fn meta(&self) -> &ObjectMeta;

    fn meta_mut(&mut self) -> &mut ObjectMeta;

    fn name(&self) -> &str {
        &self.meta().name
    }

    fn namespace(&self) -> &str {
        &self.meta().namespace
    }

    fn key(&self) -> ObjectKey {
        self.meta().key()
    }

    /// Controller owner reference pointing at this object
    fn owner_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            name: self.meta().name.clone(),
            uid: self.meta().uid.clone(),
            controller: true,
            block_owner_deletion: true,
        }
    }

    fn to_raw(&self) -> Result<RawObject> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.insert("kind".into(), Value::String(Self::KIND.into()));
            map.insert("apiVersion".into(), Value::String(API_VERSION.into()));
        } else {
            return Err(Error::Invalid(format!(
                "{} does not serialize to a JSON object",
                Self::KIND
            )));
        }
        RawObject::from_value(value)
    }

    fn from_raw(raw: RawObject) -> Result<Self> {
        if raw.kind != Self::KIND {
            return Err(Error::Invalid(format!(
                "expected kind {}, found {}",
                Self::KIND,
                raw.kind
            )));
        }
        Ok(serde_json::from_value(raw.to_value()?)?)
    }
}

/// Filter for [`ObjectStore::list`](crate::ObjectStore::list)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    /// Restrict to one namespace (all namespaces when `None`)
    pub namespace: Option<String>,
    /// Every label here must match exactly
    pub labels: BTreeMap<String, String>,
}

impl ListParams {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, meta: &ObjectMeta) -> bool {
        if let Some(ns) = &self.namespace
            && ns != &meta.namespace
        {
            return false;
        }
        self.labels
            .iter()
            .all(|(k, v)| meta.labels.get(k) == Some(v))
    }
}
