use anyhow::{Result, bail};
use objstore::{ObjectKey, ObjectStore, StoreExt};
use resources::Job;

use crate::Context;
use crate::cli::JobCommand;
use crate::ui;

pub fn run(ctx: &Context, cmd: JobCommand) -> Result<()> {
    let store = super::open_store(ctx)?;
    match cmd {
        JobCommand::Complete { name, namespace } => {
            let key = ObjectKey::new(namespace, name);
            finish(&store, &key, None)?;
            ui::success(&format!("Job {key} marked succeeded"));
        }
        JobCommand::Fail {
            name,
            namespace,
            reason,
        } => {
            let key = ObjectKey::new(namespace, name);
            finish(&store, &key, Some(&reason))?;
            ui::warn(&format!("Job {key} marked failed: {reason}"));
        }
    }
    Ok(())
}

/// Record a terminal outcome: succeeded when `failure` is `None`
pub fn finish(store: &dyn ObjectStore, key: &ObjectKey, failure: Option<&str>) -> Result<Job> {
    let job: Job = store.fetch(key)?;
    if !job.is_active() {
        bail!("Job {key} already finished");
    }

    let mut done = job.clone();
    match failure {
        Some(reason) => done.mark_failed(reason),
        None => done.mark_succeeded(),
    }
    Ok(store.patch_typed(&job, &done)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use objstore::{MemoryStore, ObjectMeta};

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let job = Job {
            metadata: ObjectMeta::new("ml", "run-t1"),
            ..Default::default()
        };
        store.create_typed(&job).unwrap();
        store
    }

    #[test]
    fn test_complete_then_refuse_second_outcome() {
        let store = seeded();
        let key = ObjectKey::new("ml", "run-t1");

        let job = finish(&store, &key, None).unwrap();
        assert!(job.is_complete());
        assert!(!job.is_failed());

        assert!(finish(&store, &key, Some("OOMKilled")).is_err());
    }

    #[test]
    fn test_fail_records_reason() {
        let store = seeded();
        let job = finish(&store, &ObjectKey::new("ml", "run-t1"), Some("OOMKilled")).unwrap();
        assert!(job.is_failed());
        assert_eq!(job.status.conditions[0].reason, "OOMKilled");
    }

    #[test]
    fn test_missing_job() {
        let store = MemoryStore::new();
        assert!(finish(&store, &ObjectKey::new("ml", "nope"), None).is_err());
    }
}
