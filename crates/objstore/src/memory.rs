//! In-process object store

use crate::error::{Error, Result};
use crate::meta::{ListParams, ObjectKey, RawObject};
use crate::store::{ObjectStore, apply_patch, next_timestamp, prepare_create, sort_by_creation};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

type StoreKey = (String, String, String);

#[derive(Default)]
struct Inner {
    objects: BTreeMap<StoreKey, RawObject>,
    version: u64,
    last_created: Option<DateTime<Utc>>,
    denied: BTreeSet<(&'static str, String)>,
}

impl Inner {
    fn check(&self, verb: &'static str, kind: &str) -> Result<()> {
        if self.denied.contains(&(verb, kind.to_string())) {
            return Err(Error::Forbidden {
                verb,
                kind: kind.to_string(),
            });
        }
        Ok(())
    }

    fn next_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }
}

fn store_key(kind: &str, key: &ObjectKey) -> StoreKey {
    (kind.to_string(), key.namespace.clone(), key.name.clone())
}

/// Object store kept entirely in memory
///
/// Used by tests and by dry runs. Every operation takes one lock, so each
/// call is atomic with respect to the others.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deny `verb` on `kind`; the store answers `Forbidden` from then on.
    pub fn deny(&self, verb: &'static str, kind: &str) -> Result<()> {
        self.lock()?.denied.insert((verb, kind.to_string()));
        Ok(())
    }

    /// Number of stored objects of a kind
    pub fn count(&self, kind: &str) -> Result<usize> {
        Ok(self
            .lock()?
            .objects
            .keys()
            .filter(|(k, _, _)| k == kind)
            .count())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| Error::Poisoned)
    }
}

impl ObjectStore for MemoryStore {
    fn get(&self, kind: &str, key: &ObjectKey) -> Result<RawObject> {
        let inner = self.lock()?;
        inner.check("get", kind)?;
        inner
            .objects
            .get(&store_key(kind, key))
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: kind.to_string(),
                key: key.clone(),
            })
    }

    fn list(&self, kind: &str, params: &ListParams) -> Result<Vec<RawObject>> {
        let inner = self.lock()?;
        inner.check("list", kind)?;
        let mut objects: Vec<RawObject> = inner
            .objects
            .iter()
            .filter(|((k, _, _), obj)| k == kind && params.matches(&obj.metadata))
            .map(|(_, obj)| obj.clone())
            .collect();
        sort_by_creation(&mut objects);
        Ok(objects)
    }

    fn list_all(&self) -> Result<Vec<RawObject>> {
        let inner = self.lock()?;
        let mut objects: Vec<RawObject> = inner.objects.values().cloned().collect();
        sort_by_creation(&mut objects);
        Ok(objects)
    }

    fn create(&self, object: RawObject) -> Result<RawObject> {
        let mut inner = self.lock()?;
        inner.check("create", &object.kind)?;

        let version = inner.next_version();
        let created = next_timestamp(inner.last_created);
        let object = prepare_create(object, version, created)?;
        let key = store_key(&object.kind, &object.key());
        if inner.objects.contains_key(&key) {
            return Err(Error::AlreadyExists {
                kind: object.kind.clone(),
                key: object.key(),
            });
        }

        inner.last_created = Some(created);
        inner.objects.insert(key, object.clone());
        log::trace!("created {} {}", object.kind, object.key());
        Ok(object)
    }

    fn patch(&self, original: &RawObject, modified: &RawObject) -> Result<RawObject> {
        let mut inner = self.lock()?;
        inner.check("patch", &original.kind)?;

        let key = store_key(&original.kind, &original.key());
        let stored = inner.objects.get(&key).ok_or_else(|| Error::NotFound {
            kind: original.kind.clone(),
            key: original.key(),
        })?;
        let version = inner.version + 1;
        let updated = apply_patch(stored, original, modified, version)?;

        inner.version = version;
        inner.objects.insert(key, updated.clone());
        Ok(updated)
    }

    fn delete(&self, kind: &str, key: &ObjectKey) -> Result<()> {
        let mut inner = self.lock()?;
        inner.check("delete", kind)?;
        inner
            .objects
            .remove(&store_key(kind, key))
            .map(|_| log::trace!("deleted {kind} {key}"))
            .ok_or_else(|| Error::NotFound {
                kind: kind.to_string(),
                key: key.clone(),
            })
    }
}
