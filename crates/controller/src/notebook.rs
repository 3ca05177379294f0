//! Notebooks: one pod, built from the elected revision

use crate::error::Result;
use crate::reconciler::Reconciler;
use crate::types::Action;
use objstore::{ListParams, Object, ObjectKey, ObjectMeta, ObjectStore, ResultExt, StoreExt};
use resources::{Notebook, NotebookRevision, PHASE_STOPPED, Pod, PodStatus, Revision};
use revision::Publisher;

/// Label naming the notebook a pod serves
pub const LABEL_NOTEBOOK_NAME: &str = "stencil.dev/notebook-name";

/// Label naming the revision a pod was built from
pub const LABEL_REVISION: &str = "stencil.dev/revision";

/// Annotation recording the user who owns a notebook pod
pub const ANNOTATION_OWNER: &str = "stencil.dev/owner";

/// Reconciles [`Notebook`] objects
pub struct NotebookReconciler<'a> {
    store: &'a dyn ObjectStore,
    system_namespace: String,
}

impl<'a> NotebookReconciler<'a> {
    /// Templates may live in the notebook's namespace or in `system_namespace`.
    pub fn new(store: &'a dyn ObjectStore, system_namespace: impl Into<String>) -> Self {
        Self {
            store,
            system_namespace: system_namespace.into(),
        }
    }

    pub fn reconcile(&self, key: &ObjectKey) -> Result<Action> {
        let Some(notebook) = self.store.fetch_opt::<Notebook>(key)? else {
            log::debug!("notebook {key} not found");
            return Ok(Action::Done);
        };
        let publisher = Publisher::new(self.store);

        if notebook.is_stopped() {
            log::info!("notebook {key} is stopped");
            self.store
                .delete_typed::<Pod>(key)
                .ignore_not_found()?;
            if let Some(elected) = publisher.elected(&notebook)? {
                publisher.set_stopped(&elected, true)?;
            }
            let revisions = publisher.list(&notebook)?;
            self.update_status(&notebook, &stopped_status(), &revisions)?;
            return Ok(Action::Done);
        }

        let template = notebook.template_key();
        if template.namespace != notebook.metadata.namespace
            && template.namespace != self.system_namespace
        {
            log::warn!(
                "notebook {key}: template {template} must be in namespace {} or {}",
                notebook.metadata.namespace,
                self.system_namespace
            );
            return Ok(Action::Done);
        }

        let elected = publisher.elect_revision(&notebook)?;
        let elected = publisher.set_stopped(&elected, false)?;

        let pod = match self.store.fetch_opt::<Pod>(key)? {
            Some(pod) => pod,
            None => self.create_pod(&notebook, &elected)?,
        };

        let revisions = publisher.list(&notebook)?;
        self.update_status(&notebook, &pod.status, &revisions)?;
        Ok(Action::Done)
    }

    fn create_pod(&self, notebook: &Notebook, revision: &Revision) -> Result<Pod> {
        let template = revision.pod_template_spec()?;

        let mut metadata = ObjectMeta::new(&notebook.metadata.namespace, &notebook.metadata.name);
        metadata.labels = template.metadata.labels;
        metadata.annotations = template.metadata.annotations;
        metadata
            .labels
            .insert(LABEL_NOTEBOOK_NAME.to_string(), notebook.metadata.name.clone());
        metadata
            .labels
            .insert(LABEL_REVISION.to_string(), revision.name().to_string());
        metadata
            .annotations
            .insert(ANNOTATION_OWNER.to_string(), notebook.spec.owner.name.clone());
        metadata.add_owner(Object::owner_reference(notebook));

        let pod = Pod {
            metadata,
            spec: template.spec,
            status: PodStatus::default(),
        };
        match self.store.create_typed(&pod).ignore_already_exists()? {
            Some(created) => {
                log::info!("created pod {} from revision {}", created.key(), revision.name());
                Ok(created)
            }
            None => Ok(self.store.fetch(&pod.key())?),
        }
    }

    fn update_status(
        &self,
        notebook: &Notebook,
        pod: &PodStatus,
        revisions: &[Revision],
    ) -> Result<()> {
        let mut updated = notebook.clone();
        updated.status.phase.clone_from(&pod.phase);
        updated.status.conditions.clone_from(&pod.conditions);
        updated.status.revisions = revisions
            .iter()
            .rev()
            .map(|r| NotebookRevision {
                name: r.metadata.name.clone(),
                elected: r.is_elected(),
                created_at: r.metadata.creation_timestamp,
            })
            .collect();

        if updated.status != notebook.status {
            self.store.patch_typed(notebook, &updated)?;
        }
        Ok(())
    }
}

fn stopped_status() -> PodStatus {
    PodStatus {
        phase: PHASE_STOPPED.to_string(),
        conditions: Vec::new(),
    }
}

impl Reconciler for NotebookReconciler<'_> {
    fn kind(&self) -> &'static str {
        Notebook::KIND
    }

    fn keys(&self) -> Result<Vec<ObjectKey>> {
        Ok(self
            .store
            .list(Notebook::KIND, &ListParams::default())?
            .iter()
            .map(objstore::RawObject::key)
            .collect())
    }

    fn reconcile(&self, key: &ObjectKey) -> Result<Action> {
        NotebookReconciler::reconcile(self, key)
    }
}
