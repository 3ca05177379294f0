//! Owner-reference garbage collection
//!
//! Dependents name their owners by uid. Once every owner of an object is
//! gone, the object is deleted; deletions cascade until nothing changes.

use crate::error::{Result, ResultExt};
use crate::meta::{ObjectKey, RawObject};
use crate::store::ObjectStore;
use std::collections::HashSet;

/// An object removed by [`collect_garbage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collected {
    pub kind: String,
    pub key: ObjectKey,
}

fn is_orphan(object: &RawObject, live: &HashSet<&str>) -> bool {
    let owners = &object.metadata.owner_references;
    !owners.is_empty() && owners.iter().all(|o| !live.contains(o.uid.as_str()))
}

/// Delete every object whose owners no longer exist, repeating until a
/// fixpoint so that whole ownership chains are removed.
pub fn collect_garbage(store: &dyn ObjectStore) -> Result<Vec<Collected>> {
    let mut collected = Vec::new();
    loop {
        let objects = store.list_all()?;
        let live: HashSet<&str> = objects
            .iter()
            .map(|o| o.metadata.uid.as_str())
            .filter(|uid| !uid.is_empty())
            .collect();

        let orphans: Vec<&RawObject> = objects.iter().filter(|o| is_orphan(o, &live)).collect();
        if orphans.is_empty() {
            return Ok(collected);
        }

        for orphan in orphans {
            log::debug!("collecting orphaned {} {}", orphan.kind, orphan.key());
            // a concurrent collector may have won the race
            store
                .delete(&orphan.kind, &orphan.key())
                .ignore_not_found()?;
            collected.push(Collected {
                kind: orphan.kind.clone(),
                key: orphan.key(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::meta::ObjectMeta;

    fn raw(kind: &str, name: &str) -> RawObject {
        RawObject::new(kind, ObjectMeta::new("test", name))
    }

    #[test]
    fn test_cascades_through_ownership_chain() {
        let store = MemoryStore::new();
        let run = store.create(raw("Execution", "run")).unwrap();

        let mut rev = raw("Revision", "run-t1-abc");
        rev.metadata.add_owner(run.owner_reference());
        let rev = store.create(rev).unwrap();

        let mut secret = raw("Secret", "run-t1-abc-creds");
        secret.metadata.add_owner(rev.owner_reference());
        store.create(secret).unwrap();

        store.create(raw("Dag", "unowned")).unwrap();

        // nothing to collect while the root exists
        assert!(collect_garbage(&store).unwrap().is_empty());

        store.delete("Execution", &run.key()).unwrap();
        let collected = collect_garbage(&store).unwrap();

        let kinds: Vec<&str> = collected.iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(kinds, vec!["Revision", "Secret"]);
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_object_survives_while_any_owner_lives() {
        let store = MemoryStore::new();
        let a = store.create(raw("Execution", "a")).unwrap();
        let b = store.create(raw("Execution", "b")).unwrap();

        let mut shared = raw("Secret", "shared");
        shared.metadata.add_owner(a.owner_reference());
        shared.metadata.add_owner(b.owner_reference());
        store.create(shared).unwrap();

        store.delete("Execution", &a.key()).unwrap();
        assert!(collect_garbage(&store).unwrap().is_empty());
    }
}
