//! Task graphs and their runs

use crate::DEFAULT_PARALLELISM;
use crate::error::{Error, Result};
use crate::pod::{Condition, ResourceList};
use crate::template::{OptionReference, TemplateReference};
use objstore::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// One node of a task graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DagTask {
    pub name: String,
    #[serde(default)]
    pub template_ref: TemplateReference,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: ResourceList,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagSpec {
    pub entrypoint: String,
    #[serde(default)]
    pub tasks: Vec<DagTask>,
}

/// A graph of dependent tasks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dag {
    pub metadata: ObjectMeta,
    pub spec: DagSpec,
}

impl Dag {
    /// The task named by the entrypoint, or an empty task if there is none
    pub fn entrypoint(&self) -> DagTask {
        self.spec
            .tasks
            .iter()
            .find(|t| t.name == self.spec.entrypoint)
            .cloned()
            .unwrap_or_default()
    }

    pub fn task_map(&self) -> HashMap<&str, &DagTask> {
        self.spec
            .tasks
            .iter()
            .map(|t| (t.name.as_str(), t))
            .collect()
    }
}

/// Admission check for a task graph: names must be present and unique.
pub fn validate_dag(dag: &Dag) -> Result<()> {
    let mut seen = HashSet::new();
    for (position, task) in dag.spec.tasks.iter().enumerate() {
        if task.name.is_empty() {
            return Err(Error::UnnamedTask {
                dag: dag.metadata.name.clone(),
                position,
            });
        }
        if !seen.insert(task.name.as_str()) {
            return Err(Error::DuplicateTask {
                dag: dag.metadata.name.clone(),
                task: task.name.clone(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSpec {
    pub dag_ref: OptionReference,
    /// Maximum tasks in flight; 0 means the default of 20
    #[serde(default)]
    pub parallelism: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub succeeded: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskStatus>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub succeeded: bool,
}

/// One run of a [`Dag`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub metadata: ObjectMeta,
    pub spec: ExecutionSpec,
    #[serde(default)]
    pub status: ExecutionStatus,
}

impl Execution {
    pub fn max_concurrent_tasks(&self) -> usize {
        match self.spec.parallelism {
            0 => DEFAULT_PARALLELISM,
            n => n,
        }
    }

    pub fn set_task_status(&mut self, task: &str, status: TaskStatus) {
        self.status.tasks.insert(task.to_string(), status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dag(value: serde_json::Value) -> Dag {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_entrypoint_lookup() {
        let d = dag(json!({
            "metadata": {"name": "d"},
            "spec": {"entrypoint": "t1", "tasks": [
                {"name": "t2"},
                {"name": "t1", "dependencies": ["t2"]}
            ]}
        }));
        let entry = d.entrypoint();
        assert_eq!(entry.name, "t1");
        assert_eq!(entry.dependencies, vec!["t2"]);
        assert_eq!(d.task_map().len(), 2);
    }

    #[test]
    fn test_missing_entrypoint_is_default_task() {
        let d = dag(json!({
            "metadata": {"name": "d"},
            "spec": {"entrypoint": "nope", "tasks": [{"name": "t1"}]}
        }));
        assert_eq!(d.entrypoint(), DagTask::default());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let d = dag(json!({
            "metadata": {"name": "d"},
            "spec": {"entrypoint": "t1", "tasks": [{"name": "t1"}, {"name": "t1"}]}
        }));
        assert!(matches!(validate_dag(&d), Err(Error::DuplicateTask { task, .. }) if task == "t1"));

        let d = dag(json!({
            "metadata": {"name": "d"},
            "spec": {"entrypoint": "t1", "tasks": [{"name": "t1"}, {"name": ""}]}
        }));
        assert!(matches!(validate_dag(&d), Err(Error::UnnamedTask { position: 1, .. })));
    }

    #[test]
    fn test_default_parallelism() {
        let mut run = Execution::default();
        assert_eq!(run.max_concurrent_tasks(), 20);
        run.spec.parallelism = 3;
        assert_eq!(run.max_concurrent_tasks(), 3);
    }

    #[test]
    fn test_set_task_status() {
        let mut run = Execution::default();
        run.set_task_status(
            "t1",
            TaskStatus {
                completed: true,
                ..TaskStatus::default()
            },
        );
        assert!(run.status.tasks["t1"].completed);
    }
}
