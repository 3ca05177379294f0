//! The object store interface and the bookkeeping shared by its backends

use crate::error::{Error, Result, ResultExt};
use crate::meta::{ListParams, Object, ObjectKey, RawObject};
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};

/// Generic, namespaced object store with optimistic concurrency
///
/// All operations are blocking. Implementations must be safe to share across
/// threads; callers reconciling different identities may use one store
/// concurrently.
pub trait ObjectStore: Send + Sync {
    /// Fetch one object
    fn get(&self, kind: &str, key: &ObjectKey) -> Result<RawObject>;

    /// List objects of a kind, filtered by namespace and labels
    fn list(&self, kind: &str, params: &ListParams) -> Result<Vec<RawObject>>;

    /// List every stored object regardless of kind
    fn list_all(&self) -> Result<Vec<RawObject>>;

    /// Create an object. Fails with `AlreadyExists` if the identity is taken.
    ///
    /// The store assigns uid, resource version and creation timestamp.
    fn create(&self, object: RawObject) -> Result<RawObject>;

    /// Apply the difference between `original` and `modified` to the stored
    /// object.
    ///
    /// Fails with `Conflict` if the stored resource version no longer
    /// matches `original`.
    fn patch(&self, original: &RawObject, modified: &RawObject) -> Result<RawObject>;

    /// Delete an object
    fn delete(&self, kind: &str, key: &ObjectKey) -> Result<()>;
}

/// Typed convenience layer over any [`ObjectStore`]
pub trait StoreExt: ObjectStore {
    fn fetch<T: Object>(&self, key: &ObjectKey) -> Result<T> {
        T::from_raw(self.get(T::KIND, key)?)
    }

    /// Fetch an object, mapping `NotFound` to `None`
    fn fetch_opt<T: Object>(&self, key: &ObjectKey) -> Result<Option<T>> {
        self.fetch(key).ignore_not_found()
    }

    fn list_typed<T: Object>(&self, params: &ListParams) -> Result<Vec<T>> {
        self.list(T::KIND, params)?
            .into_iter()
            .map(T::from_raw)
            .collect()
    }

    fn create_typed<T: Object>(&self, object: &T) -> Result<T> {
        T::from_raw(self.create(object.to_raw()?)?)
    }

    fn patch_typed<T: Object>(&self, original: &T, modified: &T) -> Result<T> {
        T::from_raw(self.patch(&original.to_raw()?, &modified.to_raw()?)?)
    }

    fn delete_typed<T: Object>(&self, key: &ObjectKey) -> Result<()> {
        self.delete(T::KIND, key)
    }
}

impl<S: ObjectStore + ?Sized> StoreExt for S {}

/// Compute an RFC 7386 merge patch that turns `original` into `modified`.
pub fn merge_patch_diff(original: &Value, modified: &Value) -> Value {
    match (original, modified) {
        (Value::Object(from), Value::Object(to)) => {
            let mut patch = Map::new();
            for key in from.keys() {
                if !to.contains_key(key) {
                    patch.insert(key.clone(), Value::Null);
                }
            }
            for (key, new) in to {
                match from.get(key) {
                    Some(old) if old == new => {}
                    Some(old) if old.is_object() && new.is_object() => {
                        patch.insert(key.clone(), merge_patch_diff(old, new));
                    }
                    _ => {
                        patch.insert(key.clone(), new.clone());
                    }
                }
            }
            Value::Object(patch)
        }
        _ => modified.clone(),
    }
}

/// Apply an RFC 7386 merge patch in place.
pub fn merge_patch_apply(target: &mut Value, patch: &Value) {
    let Value::Object(fields) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        for (key, value) in fields {
            if value.is_null() {
                map.remove(key);
            } else {
                merge_patch_apply(map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

/// Creation timestamp strictly after `last`, so creation order is total.
pub(crate) fn next_timestamp(last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match last {
        Some(prev) if now <= prev => prev + Duration::microseconds(1),
        _ => now,
    }
}

/// Stamp store-assigned fields onto a new object.
pub(crate) fn prepare_create(
    mut object: RawObject,
    version: u64,
    created: DateTime<Utc>,
) -> Result<RawObject> {
    if object.metadata.name.is_empty() && object.metadata.generate_name.is_empty() {
        return Err(Error::Invalid(format!("{} has no name", object.kind)));
    }
    let meta = &mut object.metadata;
    if meta.name.is_empty() {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        meta.name = format!("{}{}", meta.generate_name, &suffix[..5]);
    }
    meta.uid = uuid::Uuid::new_v4().to_string();
    meta.resource_version = version.to_string();
    meta.creation_timestamp = Some(created);
    meta.deletion_timestamp = None;
    Ok(object)
}

/// Apply a patch computed from `original` -> `modified` onto `stored`.
///
/// Identity fields (kind, name, namespace, uid, creation timestamp) are
/// preserved from the stored object regardless of what the patch says.
pub(crate) fn apply_patch(
    stored: &RawObject,
    original: &RawObject,
    modified: &RawObject,
    version: u64,
) -> Result<RawObject> {
    if original.metadata.resource_version != stored.metadata.resource_version {
        return Err(Error::Conflict {
            kind: stored.kind.clone(),
            key: stored.key(),
            expected: original.metadata.resource_version.clone(),
            found: stored.metadata.resource_version.clone(),
        });
    }

    let patch = merge_patch_diff(&original.to_value()?, &modified.to_value()?);
    let mut value = stored.to_value()?;
    merge_patch_apply(&mut value, &patch);

    let mut updated = RawObject::from_value(value)?;
    updated.kind = stored.kind.clone();
    updated.metadata.name = stored.metadata.name.clone();
    updated.metadata.namespace = stored.metadata.namespace.clone();
    updated.metadata.uid = stored.metadata.uid.clone();
    updated.metadata.creation_timestamp = stored.metadata.creation_timestamp;
    updated.metadata.resource_version = version.to_string();
    Ok(updated)
}

/// Sort objects oldest first, breaking timestamp ties by name.
pub(crate) fn sort_by_creation(objects: &mut [RawObject]) {
    objects.sort_by(|a, b| {
        a.metadata
            .creation_timestamp
            .cmp(&b.metadata.creation_timestamp)
            .then_with(|| a.metadata.name.cmp(&b.metadata.name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::ObjectMeta;
    use serde_json::json;

    #[test]
    fn test_merge_patch_diff_and_apply() {
        let original = json!({"a": 1, "b": {"c": 2, "d": 3}, "gone": true});
        let modified = json!({"a": 1, "b": {"c": 5, "d": 3}, "new": [1, 2]});

        let patch = merge_patch_diff(&original, &modified);
        assert_eq!(patch, json!({"b": {"c": 5}, "gone": null, "new": [1, 2]}));

        let mut target = original.clone();
        merge_patch_apply(&mut target, &patch);
        assert_eq!(target, modified);
    }

    #[test]
    fn test_patch_applies_onto_newer_fields() {
        // a concurrent writer added "other"; our patch must not remove it
        let original = json!({"spec": {"elected": false}});
        let modified = json!({"spec": {"elected": true}});
        let mut stored = json!({"spec": {"elected": false, "other": 1}});

        merge_patch_apply(&mut stored, &merge_patch_diff(&original, &modified));
        assert_eq!(stored, json!({"spec": {"elected": true, "other": 1}}));
    }

    #[test]
    fn test_next_timestamp_is_strictly_increasing() {
        let first = next_timestamp(None);
        let far_future = first + Duration::days(1);
        let second = next_timestamp(Some(far_future));
        assert!(second > far_future);
    }

    #[test]
    fn test_apply_patch_conflict() {
        let mut stored = RawObject::new("Revision", ObjectMeta::new("ns", "r"));
        stored.metadata.resource_version = "5".into();
        let mut original = stored.clone();
        original.metadata.resource_version = "4".into();
        let modified = original.clone();

        let err = apply_patch(&stored, &original, &modified, 6).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_prepare_create_generates_name() {
        let mut meta = ObjectMeta::default();
        meta.generate_name = "job-".into();
        let created = prepare_create(RawObject::new("Job", meta), 1, Utc::now()).unwrap();
        assert!(created.metadata.name.starts_with("job-"));
        assert_eq!(created.metadata.name.len(), "job-".len() + 5);
        assert_eq!(created.metadata.resource_version, "1");
        assert!(!created.metadata.uid.is_empty());
    }
}
