use anyhow::{Context as _, Result};
use colored::Colorize;
use objstore::{ObjectKey, ObjectStore, StoreExt};
use resources::{Dag, Execution};

use crate::Context;
use crate::ui;

/// One line of the status table
#[derive(Debug, PartialEq, Eq)]
pub struct TaskLine {
    pub task: String,
    pub job: String,
    /// `None` while the task has no job yet
    pub state: Option<(bool, bool)>,
}

pub fn run(ctx: &Context, name: &str, namespace: &str) -> Result<()> {
    let store = super::open_store(ctx)?;
    let key = ObjectKey::new(namespace, name);
    let (run, lines) = task_lines(&store, &key)?;

    ui::header(&format!("Execution {key}"));
    ui::kv("dag", &run.spec.dag_ref.name);
    ui::kv("parallelism", &run.max_concurrent_tasks().to_string());
    ui::kv(
        "state",
        &ui::outcome(run.status.completed, run.status.succeeded).to_string(),
    );
    println!();

    for line in lines {
        let state = match line.state {
            Some((completed, succeeded)) => ui::outcome(completed, succeeded),
            None => "pending".dimmed(),
        };
        println!("  {:<24} {:<10} {}", line.task, state, line.job.dimmed());
    }
    Ok(())
}

/// Every task of the run's graph with its recorded state, in graph order
pub fn task_lines(store: &dyn ObjectStore, key: &ObjectKey) -> Result<(Execution, Vec<TaskLine>)> {
    let run: Execution = store
        .fetch(key)
        .with_context(|| format!("Could not load execution {key}"))?;
    let dag: Dag = store
        .fetch(&ObjectKey::new(&key.namespace, &run.spec.dag_ref.name))
        .with_context(|| format!("Could not load dag {}", run.spec.dag_ref.name))?;

    let lines = dag
        .spec
        .tasks
        .iter()
        .map(|task| TaskLine {
            task: task.name.clone(),
            job: format!("{}-{}", run.metadata.name, task.name),
            state: run
                .status
                .tasks
                .get(&task.name)
                .map(|status| (status.completed, status.succeeded)),
        })
        .collect();
    Ok((run, lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use controller::ExecutionReconciler;
    use objstore::{MemoryStore, RawObject};
    use serde_json::json;

    #[test]
    fn test_task_lines_follow_reconciled_state() {
        let store = MemoryStore::new();
        for value in [
            json!({
                "kind": "Template",
                "metadata": {"name": "trainer", "namespace": "ml"},
                "spec": {"template": {"spec": {"containers": [{"name": "main", "image": "t:1"}]}}}
            }),
            json!({
                "kind": "Dag",
                "metadata": {"name": "dag", "namespace": "ml"},
                "spec": {"entrypoint": "t1", "tasks": [
                    {"name": "t1", "templateRef": {"name": "trainer"}, "dependencies": ["t2"]},
                    {"name": "t2", "templateRef": {"name": "trainer"}}
                ]}
            }),
            json!({
                "kind": "Execution",
                "metadata": {"name": "run", "namespace": "ml"},
                "spec": {"dagRef": {"name": "dag"}}
            }),
        ] {
            store.create(RawObject::from_value(value).unwrap()).unwrap();
        }
        let key = ObjectKey::new("ml", "run");
        ExecutionReconciler::new(&store).reconcile(&key).unwrap();

        let (_, lines) = task_lines(&store, &key).unwrap();
        assert_eq!(
            lines,
            vec![
                TaskLine {
                    task: "t1".into(),
                    job: "run-t1".into(),
                    state: None,
                },
                TaskLine {
                    task: "t2".into(),
                    job: "run-t2".into(),
                    state: Some((false, false)),
                },
            ]
        );
    }
}
