//! Immutable template snapshots

use crate::error::Result;
use crate::pod::PodTemplateSpec;
use objstore::ObjectMeta;
use serde::{Deserialize, Serialize};

/// Number of hex characters of the content hash used in revision names
pub const HASH_LEN: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionSpec {
    #[serde(default)]
    pub elected: bool,
    #[serde(default)]
    pub stopped: bool,
    /// Canonical JSON of the resolved [`PodTemplateSpec`]
    #[serde(default)]
    pub snapshot: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionStatus {
    #[serde(default)]
    pub ready: bool,
}

/// A content-addressed snapshot of a resolved template
///
/// Only `elected` and `stopped` change after creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub metadata: ObjectMeta,
    pub spec: RevisionSpec,
    #[serde(default)]
    pub status: RevisionStatus,
}

impl Revision {
    pub fn with_snapshot(snapshot: String) -> Self {
        Self {
            spec: RevisionSpec {
                snapshot,
                ..RevisionSpec::default()
            },
            ..Self::default()
        }
    }

    pub fn data(&self) -> &str {
        &self.spec.snapshot
    }

    /// Decode the snapshot back into a template
    pub fn pod_template_spec(&self) -> Result<PodTemplateSpec> {
        Ok(serde_json::from_str(&self.spec.snapshot)?)
    }

    /// Content hash of the snapshot
    pub fn hash(&self) -> String {
        let digest = blake3::hash(self.spec.snapshot.as_bytes()).to_hex();
        digest[..HASH_LEN].to_string()
    }

    pub fn is_elected(&self) -> bool {
        self.spec.elected
    }

    pub fn elect(&mut self) {
        self.spec.elected = true;
    }

    pub fn recall(&mut self) {
        self.spec.elected = false;
    }

    pub fn is_stopped(&self) -> bool {
        self.spec.stopped
    }

    pub fn set_stopped(&mut self, stopped: bool) {
        self.spec.stopped = stopped;
    }
}
