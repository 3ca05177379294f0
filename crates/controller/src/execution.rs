//! Runs of task graphs: one Job per task, bounded in-flight, fail fast

use crate::error::Result;
use crate::plan::dependency_order;
use crate::reconciler::Reconciler;
use crate::task::{NamespacedTask, command_patch, restart_patch};
use crate::types::{Action, DEFAULT_REQUEUE};
use objstore::{ListParams, Object, ObjectKey, ObjectMeta, ObjectStore, ResultExt, StoreExt};
use resources::{Dag, DagTask, Execution, Job, JobSpec, TaskStatus};
use revision::Publisher;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Label naming the run a Job belongs to
pub const LABEL_EXECUTION: &str = "stencil.dev/execution";

/// Label naming the task a Job runs
pub const LABEL_TASK: &str = "stencil.dev/task";

/// Reconciles [`Execution`] objects
pub struct ExecutionReconciler<'a> {
    store: &'a dyn ObjectStore,
    requeue: Duration,
}

impl<'a> ExecutionReconciler<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self {
            store,
            requeue: DEFAULT_REQUEUE,
        }
    }

    /// Delay before re-checking an unfinished run
    pub fn with_requeue(mut self, requeue: Duration) -> Self {
        self.requeue = requeue;
        self
    }

    /// Advance one run.
    ///
    /// Jobs of reachable tasks are observed first. Any failed Job ends the
    /// run as failed before anything new is created. Otherwise tasks are
    /// walked dependencies-first; a task whose dependencies are complete
    /// gets its Job created while fewer than the run's bound are in flight,
    /// and waits for a later pass otherwise.
    pub fn reconcile(&self, key: &ObjectKey) -> Result<Action> {
        let Some(original) = self.store.fetch_opt::<Execution>(key)? else {
            log::debug!("execution {key} not found");
            return Ok(Action::Done);
        };
        if original.status.completed {
            return Ok(Action::Done);
        }

        let mut run = original.clone();
        run.status.tasks.clear();

        let dag_key = ObjectKey::new(&key.namespace, &run.spec.dag_ref.name);
        let dag: Dag = self.store.fetch(&dag_key).inspect_err(|e| {
            log::error!("execution {key}: failed to get Dag {dag_key}: {e}");
        })?;
        let order = dependency_order(&dag).inspect_err(|e| {
            log::error!("execution {key}: {e}");
        })?;

        let mut jobs: HashMap<&str, Job> = HashMap::new();
        for task in &order {
            if let Some(job) = self.store.fetch_opt::<Job>(&job_key(&run, task))? {
                jobs.insert(task.name.as_str(), job);
            }
        }

        if let Some((failed, _)) = jobs.iter().find(|(_, job)| job.is_failed()) {
            log::info!("execution {key}: task {failed} failed");
            for (name, job) in &jobs {
                run.set_task_status(name, task_status(job));
            }
            run.status.completed = true;
            run.status.succeeded = false;
            self.save_status(&original, &run)?;
            return Ok(Action::Done);
        }

        let bound = run.max_concurrent_tasks();
        let mut in_flight = jobs.values().filter(|job| job.is_active()).count();
        let mut completed: HashSet<&str> = HashSet::new();
        let mut deferred = 0usize;

        for task in &order {
            if !task.dependencies.iter().all(|d| completed.contains(d.as_str())) {
                continue;
            }
            let job = match jobs.remove(task.name.as_str()) {
                Some(job) => job,
                None if in_flight >= bound => {
                    deferred += 1;
                    continue;
                }
                None => {
                    in_flight += 1;
                    self.create_job(&run, task)?
                }
            };

            run.set_task_status(&task.name, task_status(&job));
            if job.is_complete() {
                completed.insert(task.name.as_str());
            }
        }

        if deferred > 0 {
            log::debug!(
                "execution {key}: {deferred} ready task(s) deferred, {in_flight}/{bound} in flight"
            );
        }

        let done = order.iter().all(|task| {
            run.status
                .tasks
                .get(&task.name)
                .is_some_and(|status| status.completed)
        });
        if !done {
            self.save_status(&original, &run)?;
            return Ok(Action::RequeueAfter(self.requeue));
        }

        run.status.completed = true;
        run.status.succeeded = run.status.tasks.values().all(|status| status.succeeded);
        log::info!(
            "execution {key} finished: {}",
            if run.status.succeeded { "succeeded" } else { "failed" }
        );
        self.save_status(&original, &run)?;
        Ok(Action::Done)
    }

    /// Write `run` over the state it was computed from.
    ///
    /// A run changed by someone else in between is a conflict, surfaced to
    /// the caller so the whole pass is recomputed.
    fn save_status(&self, original: &Execution, run: &Execution) -> Result<()> {
        if let Err(e) = self.store.patch_typed(original, run) {
            let e = crate::Error::from(e);
            if e.is_conflict() {
                log::debug!("execution {}: changed concurrently, retrying later", original.key());
            }
            return Err(e);
        }
        Ok(())
    }

    fn create_job(&self, run: &Execution, task: &DagTask) -> Result<Job> {
        let mut patches = vec![restart_patch()];
        if !task.command.is_empty() {
            patches.push(command_patch(&task.command));
        }

        let referrer = NamespacedTask::new(run, task);
        let revision = Publisher::new(self.store)
            .with_patches(patches)
            .create(&referrer)?;

        let key = job_key(run, task);
        let mut metadata = ObjectMeta::new(&key.namespace, &key.name);
        metadata
            .labels
            .insert(LABEL_EXECUTION.to_string(), run.metadata.name.clone());
        metadata
            .labels
            .insert(LABEL_TASK.to_string(), task.name.clone());
        metadata.add_owner(run.owner_reference());

        let job = Job {
            metadata,
            spec: JobSpec {
                template: revision.pod_template_spec()?,
                backoff_limit: Some(0),
                completions: Some(1),
            },
            status: Default::default(),
        };

        match self.store.create_typed(&job).ignore_already_exists()? {
            Some(created) => {
                log::info!("created job {key} from revision {}", revision.name());
                Ok(created)
            }
            None => Ok(self.store.fetch(&key)?),
        }
    }
}

impl Reconciler for ExecutionReconciler<'_> {
    fn kind(&self) -> &'static str {
        Execution::KIND
    }

    fn keys(&self) -> Result<Vec<ObjectKey>> {
        Ok(self
            .store
            .list(Execution::KIND, &ListParams::default())?
            .iter()
            .map(objstore::RawObject::key)
            .collect())
    }

    fn reconcile(&self, key: &ObjectKey) -> Result<Action> {
        ExecutionReconciler::reconcile(self, key)
    }
}

fn job_key(run: &Execution, task: &DagTask) -> ObjectKey {
    ObjectKey::new(
        &run.metadata.namespace,
        format!("{}-{}", run.metadata.name, task.name),
    )
}

fn task_status(job: &Job) -> TaskStatus {
    TaskStatus {
        conditions: job.status.conditions.clone(),
        completed: job.is_complete(),
        succeeded: job.status.succeeded > 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objstore::{MemoryStore, RawObject};
    use resources::Revision;
    use serde_json::{Value, json};

    const NS: &str = "test";

    fn put(store: &MemoryStore, value: Value) {
        store.create(RawObject::from_value(value).unwrap()).unwrap();
    }

    fn seeded(tasks: Value, parallelism: usize) -> MemoryStore {
        let store = MemoryStore::new();
        put(&store, json!({
            "kind": "Template",
            "metadata": {"name": "trainer", "namespace": NS},
            "spec": {
                "options": [{"name": "gpu"}],
                "template": {"spec": {
                    "restartPolicy": "Always",
                    "containers": [{"name": "main", "image": "trainer:1", "command": ["sleep"]}]
                }}
            }
        }));
        put(&store, json!({
            "kind": "Dag",
            "metadata": {"name": "dag", "namespace": NS},
            "spec": {"entrypoint": "t1", "tasks": tasks}
        }));
        put(&store, json!({
            "kind": "Execution",
            "metadata": {"name": "run", "namespace": NS},
            "spec": {"dagRef": {"name": "dag"}, "parallelism": parallelism}
        }));
        store
    }

    fn task(name: &str, dependencies: &[&str]) -> Value {
        json!({"name": name, "templateRef": {"name": "trainer"}, "dependencies": dependencies})
    }

    fn run_key() -> ObjectKey {
        ObjectKey::new(NS, "run")
    }

    fn reconcile(store: &MemoryStore) -> Action {
        ExecutionReconciler::new(store).reconcile(&run_key()).unwrap()
    }

    fn run(store: &MemoryStore) -> Execution {
        store.fetch(&run_key()).unwrap()
    }

    fn jobs(store: &MemoryStore) -> Vec<String> {
        let mut names: Vec<String> = store
            .list_typed::<Job>(&ListParams::default())
            .unwrap()
            .into_iter()
            .map(|j| j.metadata.name)
            .collect();
        names.sort();
        names
    }

    fn finish(store: &MemoryStore, name: &str, succeeded: bool) {
        let job: Job = store.fetch(&ObjectKey::new(NS, name)).unwrap();
        let mut done = job.clone();
        if succeeded {
            done.mark_succeeded();
        } else {
            done.mark_failed("Error");
        }
        store.patch_typed(&job, &done).unwrap();
    }

    #[test]
    fn test_single_task_run() {
        let store = seeded(json!([task("t1", &[])]), 0);

        assert_eq!(reconcile(&store), Action::RequeueAfter(DEFAULT_REQUEUE));
        assert_eq!(jobs(&store), vec!["run-t1"]);

        let job: Job = store.fetch(&ObjectKey::new(NS, "run-t1")).unwrap();
        assert_eq!(job.spec.backoff_limit, Some(0));
        assert_eq!(job.spec.completions, Some(1));
        assert_eq!(job.spec.template.spec.restart_policy.as_deref(), Some("Never"));
        assert_eq!(job.metadata.owner_references[0].uid, run(&store).metadata.uid);
        assert_eq!(job.metadata.labels[LABEL_TASK], "t1");

        let status = run(&store).status;
        assert!(!status.completed);
        assert!(!status.tasks["t1"].completed);

        finish(&store, "run-t1", true);
        assert_eq!(reconcile(&store), Action::Done);
        let status = run(&store).status;
        assert!(status.completed && status.succeeded);
        assert!(status.tasks["t1"].succeeded);

        // terminal runs are left alone
        assert_eq!(reconcile(&store), Action::Done);
        assert_eq!(jobs(&store), vec!["run-t1"]);
    }

    #[test]
    fn test_dependency_runs_first() {
        let store = seeded(json!([task("t1", &["t2"]), task("t2", &[])]), 0);

        reconcile(&store);
        assert_eq!(jobs(&store), vec!["run-t2"]);
        reconcile(&store);
        assert_eq!(jobs(&store), vec!["run-t2"]);

        finish(&store, "run-t2", true);
        reconcile(&store);
        assert_eq!(jobs(&store), vec!["run-t1", "run-t2"]);

        finish(&store, "run-t1", true);
        assert_eq!(reconcile(&store), Action::Done);
        assert!(run(&store).status.succeeded);
    }

    #[test]
    fn test_failure_is_terminal() {
        let store = seeded(
            json!([task("t1", &["t2", "t3"]), task("t2", &[]), task("t3", &[])]),
            1,
        );

        reconcile(&store);
        assert_eq!(jobs(&store), vec!["run-t2"]);

        finish(&store, "run-t2", false);
        assert_eq!(reconcile(&store), Action::Done);

        let status = run(&store).status;
        assert!(status.completed);
        assert!(!status.succeeded);
        assert_eq!(jobs(&store), vec!["run-t2"]);

        reconcile(&store);
        assert_eq!(jobs(&store), vec!["run-t2"]);
    }

    #[test]
    fn test_tasks_over_the_bound_are_deferred_not_dropped() {
        let store = seeded(
            json!([task("t1", &["t2", "t3"]), task("t2", &[]), task("t3", &[])]),
            1,
        );

        reconcile(&store);
        assert_eq!(jobs(&store), vec!["run-t2"]);
        assert!(!run(&store).status.tasks.contains_key("t3"));

        // bound still taken by the active job
        reconcile(&store);
        assert_eq!(jobs(&store), vec!["run-t2"]);

        finish(&store, "run-t2", true);
        reconcile(&store);
        assert_eq!(jobs(&store), vec!["run-t2", "run-t3"]);

        finish(&store, "run-t3", true);
        reconcile(&store);
        assert_eq!(jobs(&store), vec!["run-t1", "run-t2", "run-t3"]);

        finish(&store, "run-t1", true);
        assert_eq!(reconcile(&store), Action::Done);
        let status = run(&store).status;
        assert!(status.completed && status.succeeded);
        assert_eq!(status.tasks.len(), 3);
    }

    #[test]
    fn test_default_bound_is_twenty() {
        let mut tasks = vec![json!({
            "name": "t1",
            "templateRef": {"name": "trainer"},
            "dependencies": (0..25).map(|i| format!("d{i}")).collect::<Vec<_>>()
        })];
        tasks.extend((0..25).map(|i| task(&format!("d{i}"), &[])));
        let store = seeded(Value::Array(tasks), 0);

        reconcile(&store);
        assert_eq!(jobs(&store).len(), 20);
    }

    #[test]
    fn test_command_override_and_options() {
        let store = seeded(
            json!([{
                "name": "t1",
                "templateRef": {"name": "trainer"},
                "command": ["python", "train.py"],
                "options": [{"name": "missing"}]
            }]),
            0,
        );
        let err = ExecutionReconciler::new(&store)
            .reconcile(&run_key())
            .unwrap_err();
        assert!(err.is_validation());
        assert!(jobs(&store).is_empty());

        let store = seeded(
            json!([{"name": "t1", "templateRef": {"name": "trainer"}, "command": ["python", "train.py"]}]),
            0,
        );
        reconcile(&store);
        let job: Job = store.fetch(&ObjectKey::new(NS, "run-t1")).unwrap();
        let main = &job.spec.template.spec.containers[0];
        assert_eq!(main.command, vec!["python", "train.py"]);
        assert_eq!(main.image.as_deref(), Some("trainer:1"));

        // the job's spec was resolved through a revision owned by the run
        let revisions: Vec<Revision> = store.list_typed(&ListParams::default()).unwrap();
        assert_eq!(revisions.len(), 1);
        assert!(revisions[0].metadata.name.starts_with("run-t1-"));
        assert_eq!(
            revisions[0].metadata.owner_references[0].uid,
            run(&store).metadata.uid
        );
    }

    #[test]
    fn test_invalid_graphs_create_nothing() {
        let store = seeded(json!([task("t1", &["t2"]), task("t2", &["t1"])]), 0);
        let err = ExecutionReconciler::new(&store)
            .reconcile(&run_key())
            .unwrap_err();
        assert!(err.is_validation());
        assert!(jobs(&store).is_empty());
    }

    #[test]
    fn test_forbidden_job_create_keeps_persisted_status() {
        let store = seeded(json!([task("t1", &["t2"]), task("t2", &[])]), 0);
        reconcile(&store);
        finish(&store, "run-t2", true);
        let before = run(&store);

        store.deny("create", Job::KIND).unwrap();
        let err = ExecutionReconciler::new(&store)
            .reconcile(&run_key())
            .unwrap_err();
        assert_eq!(err.category(), Some(objstore::ErrorCategory::Forbidden));
        assert!(!err.is_conflict());

        let after = run(&store);
        assert_eq!(after.status, before.status);
        assert!(!after.status.tasks["t2"].completed);
        assert_eq!(jobs(&store), vec!["run-t2"]);
    }

    #[test]
    fn test_stale_status_write_is_a_conflict() {
        let store = seeded(json!([task("t1", &[])]), 0);
        let stale = run(&store);

        // another writer gets in first
        let mut other = stale.clone();
        other.metadata.labels.insert("team".into(), "ml".into());
        store.patch_typed(&stale, &other).unwrap();

        let mut mine = stale.clone();
        mine.status.completed = true;
        let err = ExecutionReconciler::new(&store)
            .save_status(&stale, &mine)
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(!run(&store).status.completed);
    }

    #[test]
    fn test_missing_run_and_dag() {
        let store = MemoryStore::new();
        assert_eq!(reconcile(&store), Action::Done);

        let store = seeded(json!([task("t1", &[])]), 0);
        store.delete("Dag", &ObjectKey::new(NS, "dag")).unwrap();
        let err = ExecutionReconciler::new(&store)
            .reconcile(&run_key())
            .unwrap_err();
        assert!(matches!(err, crate::Error::Store(ref e) if e.is_not_found()));
    }
}
