//! Dependency-first ordering of the tasks reachable from an entrypoint

use crate::error::{Error, Result};
use resources::{Dag, DagTask};
use std::collections::HashMap;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Tasks reachable from the entrypoint, each after all of its dependencies.
///
/// Dependencies are visited in declared order with an explicit work stack.
/// A cycle or a dependency on an undeclared task is an error.
pub fn dependency_order(dag: &Dag) -> Result<Vec<&DagTask>> {
    let tasks = dag.task_map();
    let entrypoint = dag.entrypoint();
    let entry = match tasks.get(entrypoint.name.as_str()) {
        Some(task) if !entrypoint.name.is_empty() => *task,
        _ => {
            return Err(Error::MissingEntrypoint {
                dag: dag.metadata.name.clone(),
                entrypoint: dag.spec.entrypoint.clone(),
            });
        }
    };

    let mut marks: HashMap<&str, Mark> = HashMap::from([(entry.name.as_str(), Mark::Visiting)]);
    let mut stack: Vec<(&DagTask, usize)> = vec![(entry, 0)];
    let mut order = Vec::new();

    while let Some(top) = stack.last_mut() {
        let (task, next) = *top;
        top.1 += 1;

        let Some(dependency) = task.dependencies.get(next) else {
            marks.insert(task.name.as_str(), Mark::Done);
            order.push(task);
            stack.pop();
            continue;
        };

        match marks.get(dependency.as_str()) {
            Some(Mark::Done) => {}
            Some(Mark::Visiting) => {
                return Err(Error::DependencyCycle {
                    dag: dag.metadata.name.clone(),
                    task: dependency.clone(),
                });
            }
            None => {
                let Some(found) = tasks.get(dependency.as_str()).copied() else {
                    return Err(Error::UnknownDependency {
                        dag: dag.metadata.name.clone(),
                        task: task.name.clone(),
                        dependency: dependency.clone(),
                    });
                };
                marks.insert(found.name.as_str(), Mark::Visiting);
                stack.push((found, 0));
            }
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dag(entrypoint: &str, tasks: serde_json::Value) -> Dag {
        serde_json::from_value(json!({
            "metadata": {"name": "d", "namespace": "test"},
            "spec": {"entrypoint": entrypoint, "tasks": tasks}
        }))
        .unwrap()
    }

    fn names(order: &[&DagTask]) -> Vec<String> {
        order.iter().map(|t| t.name.clone()).collect()
    }

    #[test]
    fn test_dependencies_come_first() {
        let d = dag(
            "t1",
            json!([
                {"name": "t1", "dependencies": ["t2", "t3"]},
                {"name": "t2", "dependencies": ["t4"]},
                {"name": "t3", "dependencies": ["t4"]},
                {"name": "t4"}
            ]),
        );
        assert_eq!(names(&dependency_order(&d).unwrap()), vec!["t4", "t2", "t3", "t1"]);
    }

    #[test]
    fn test_unreachable_tasks_are_skipped() {
        let d = dag("t1", json!([{"name": "t1"}, {"name": "orphan"}]));
        assert_eq!(names(&dependency_order(&d).unwrap()), vec!["t1"]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let d = dag(
            "t1",
            json!([
                {"name": "t1", "dependencies": ["t2"]},
                {"name": "t2", "dependencies": ["t1"]}
            ]),
        );
        assert!(matches!(
            dependency_order(&d),
            Err(Error::DependencyCycle { task, .. }) if task == "t1"
        ));

        let selfish = dag("t1", json!([{"name": "t1", "dependencies": ["t1"]}]));
        assert!(dependency_order(&selfish).is_err());
    }

    #[test]
    fn test_unknown_dependency_and_entrypoint() {
        let d = dag("t1", json!([{"name": "t1", "dependencies": ["ghost"]}]));
        assert!(matches!(
            dependency_order(&d),
            Err(Error::UnknownDependency { dependency, .. }) if dependency == "ghost"
        ));

        let d = dag("nope", json!([{"name": "t1"}]));
        assert!(matches!(dependency_order(&d), Err(Error::MissingEntrypoint { .. })));

        // an unnamed task never stands in for an unset entrypoint
        let d = dag("", json!([{"name": ""}]));
        assert!(matches!(dependency_order(&d), Err(Error::MissingEntrypoint { .. })));
    }
}
