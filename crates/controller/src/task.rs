//! A task of a run, seen as a revision referrer

use objstore::{Object, ObjectKey, OwnerReference};
use resources::{DagTask, Execution, OptionReference, PodTemplateSpec, ResourceList, UpdatePolicy};
use revision::Referrer;

/// Container whose command a task override replaces
pub const MAIN_CONTAINER: &str = "main";

/// One task of one run
///
/// Named `<run>-<task>` so runs of the same graph keep separate revisions.
pub struct NamespacedTask<'a> {
    name: String,
    run: &'a Execution,
    task: &'a DagTask,
}

impl<'a> NamespacedTask<'a> {
    pub fn new(run: &'a Execution, task: &'a DagTask) -> Self {
        Self {
            name: format!("{}-{}", run.metadata.name, task.name),
            run,
            task,
        }
    }
}

impl Referrer for NamespacedTask<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> &str {
        &self.run.metadata.namespace
    }

    fn template_ref(&self) -> ObjectKey {
        let mut key = self.task.template_ref.key();
        if key.namespace.is_empty() {
            key.namespace.clone_from(&self.run.metadata.namespace);
        }
        key
    }

    fn history_limit(&self) -> i64 {
        1
    }

    fn resource_requests(&self) -> &ResourceList {
        &self.task.resources
    }

    fn elected_options(&self) -> Vec<OptionReference> {
        self.task.options.clone()
    }

    fn update_policy(&self) -> UpdatePolicy {
        UpdatePolicy::Ignore
    }

    fn owner_reference(&self) -> Option<OwnerReference> {
        Some(self.run.owner_reference())
    }
}

/// One-shot execution: never restart the pod
pub fn restart_patch() -> PodTemplateSpec {
    PodTemplateSpec::restart_policy("Never")
}

/// Replace the command of the main container
pub fn command_patch(command: &[String]) -> PodTemplateSpec {
    PodTemplateSpec::command(MAIN_CONTAINER, command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use objstore::ObjectMeta;
    use resources::TemplateReference;

    #[test]
    fn test_task_referrer() {
        let mut run = Execution::default();
        run.metadata = ObjectMeta::new("team", "run1");
        run.metadata.uid = "uid-1".into();
        let task = DagTask {
            name: "train".into(),
            template_ref: TemplateReference {
                name: "trainer".into(),
                namespace: String::new(),
            },
            ..DagTask::default()
        };

        let referrer = NamespacedTask::new(&run, &task);
        assert_eq!(Referrer::name(&referrer), "run1-train");
        assert_eq!(referrer.template_ref(), ObjectKey::new("team", "trainer"));
        assert_eq!(referrer.history_limit(), 1);
        assert_eq!(referrer.update_policy(), UpdatePolicy::Ignore);
        assert_eq!(Referrer::owner_reference(&referrer).unwrap().uid, "uid-1");
    }
}
