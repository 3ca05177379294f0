//! Creating, electing and trimming revisions for a referrer

use crate::error::{Error, Result};
use crate::referrer::Referrer;
use crate::{ANNOTATION_TEMPLATE, LABEL_NAME};
use objstore::{ListParams, Object, ObjectKey, ObjectStore, ResultExt, StoreExt};
use resources::{DependencyReference, PodDefault, PodTemplateSpec, Revision, Template, UpdatePolicy};

/// Revision manager acting on behalf of referrers
///
/// Holds no state between calls besides the caller patches: every decision
/// is recomputed from the store.
pub struct Publisher<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    patches: Vec<PodTemplateSpec>,
}

impl<'a, S: ObjectStore + ?Sized> Publisher<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            patches: Vec::new(),
        }
    }

    /// Patches applied after every overlay, in order
    pub fn with_patches(mut self, patches: impl IntoIterator<Item = PodTemplateSpec>) -> Self {
        self.patches.extend(patches);
        self
    }

    /// Revisions of a referrer, oldest first
    pub fn list(&self, referrer: &dyn Referrer) -> Result<Vec<Revision>> {
        let params = ListParams::default()
            .namespace(referrer.namespace())
            .label(LABEL_NAME, referrer.name());
        let mut revisions: Vec<Revision> = self.store.list_typed(&params)?;
        revisions.sort_by(|a, b| {
            a.metadata
                .creation_timestamp
                .cmp(&b.metadata.creation_timestamp)
                .then_with(|| a.metadata.name.cmp(&b.metadata.name))
        });
        Ok(revisions)
    }

    /// Most recently created revision
    pub fn latest(&self, referrer: &dyn Referrer) -> Result<Option<Revision>> {
        Ok(self.list(referrer)?.pop())
    }

    /// The elected revision; the newest one if several are elected, the
    /// same one [`elect_revision`](Self::elect_revision) keeps
    pub fn elected(&self, referrer: &dyn Referrer) -> Result<Option<Revision>> {
        Ok(self.list(referrer)?.into_iter().rev().find(Revision::is_elected))
    }

    /// Resolve the referrer's template and store it as a revision.
    ///
    /// Idempotent: identical content maps to the same revision name, and an
    /// existing revision is returned as is.
    pub fn create(&self, referrer: &dyn Referrer) -> Result<Revision> {
        let template_key = referrer.template_ref();
        let template: Template = self.store.fetch(&template_key).inspect_err(|e| {
            log::error!(
                "referrer {}/{}: failed to get template {template_key}: {e}",
                referrer.namespace(),
                referrer.name()
            );
        })?;

        let mut spec = template.pod_template_spec();
        spec.set_resource_requests(referrer.resource_requests());
        let mut dependencies = template.spec.dependencies.clone();

        for (pos, option) in template.spec.required.iter().enumerate() {
            self.apply_option(referrer, &template, &option.name, pos, &mut spec, &mut dependencies)?;
        }

        let elected = referrer.elected_options();
        if let Some(missing) = elected.iter().find(|o| !template.has_option(&o.name)) {
            log::warn!(
                "referrer {}/{}: option {:?} not offered by template {template_key}",
                referrer.namespace(),
                referrer.name(),
                missing.name
            );
            return Err(Error::OptionNotFound {
                option: missing.name.clone(),
                template: template_key,
            });
        }
        for (pos, option) in elected.iter().enumerate() {
            self.apply_option(referrer, &template, &option.name, pos, &mut spec, &mut dependencies)?;
        }

        spec.strategic_merge_all(&self.patches).inspect_err(|e| {
            log::error!("referrer {}: failed to merge patches: {e}", referrer.name());
        })?;

        let mut revision = Revision::with_snapshot(spec.to_canonical_json()?);
        let name = format!("{}-{}", referrer.name(), revision.hash());
        let meta = revision.meta_mut();
        meta.name = name;
        meta.namespace = referrer.namespace().to_string();
        meta.labels.insert(LABEL_NAME.to_string(), referrer.name().to_string());
        meta.annotations
            .insert(ANNOTATION_TEMPLATE.to_string(), template_key.to_string());
        if let Some(owner) = referrer.owner_reference() {
            meta.add_owner(owner);
        }

        let revision = match self.store.create_typed(&revision).ignore_already_exists()? {
            Some(created) => {
                log::info!("created revision {}", created.key());
                created
            }
            None => {
                log::debug!("revision {} already exists", revision.key());
                self.store.fetch(&revision.key())?
            }
        };

        for dependency in &dependencies {
            self.copy_dependency(&template, &revision, dependency)?;
        }

        // ready once every dependency copy exists
        let revision = if revision.status.ready {
            revision
        } else {
            let mut ready = revision.clone();
            ready.status.ready = true;
            self.store.patch_typed(&revision, &ready)?
        };

        self.trim(referrer, Some(revision.name()))?;
        Ok(revision)
    }

    fn apply_option(
        &self,
        referrer: &dyn Referrer,
        template: &Template,
        option: &str,
        pos: usize,
        spec: &mut PodTemplateSpec,
        dependencies: &mut Vec<DependencyReference>,
    ) -> Result<()> {
        let key = ObjectKey::new(template.namespace(), option);
        let fragment: PodDefault = self.store.fetch(&key).inspect_err(|e| {
            log::error!(
                "referrer {}: failed to get template option {option:?} (pos {pos}): {e}",
                referrer.name()
            );
        })?;
        spec.strategic_merge_from(&fragment.spec.template)
            .inspect_err(|e| {
                log::error!(
                    "referrer {}: failed to merge template option {option:?} (pos {pos}): {e}",
                    referrer.name()
                );
            })?;
        dependencies.extend(fragment.spec.dependencies.iter().cloned());
        Ok(())
    }

    /// Copy a dependency from the template namespace, owned by the revision.
    fn copy_dependency(
        &self,
        template: &Template,
        revision: &Revision,
        dependency: &DependencyReference,
    ) -> Result<()> {
        let source = ObjectKey::new(template.namespace(), &dependency.name);
        let mut copy = self.store.get(&dependency.kind, &source).inspect_err(|e| {
            log::error!(
                "revision {}: cannot read dependency {} {source}: {e}",
                revision.name(),
                dependency.kind
            );
        })?;

        copy.metadata.reset_lineage();
        copy.metadata.name = format!("{}-{}", revision.name(), dependency.name);
        copy.metadata.namespace = revision.namespace().to_string();
        copy.metadata.owner_references = vec![Object::owner_reference(revision)];

        if self.store.create(copy).ignore_already_exists()?.is_some() {
            log::debug!(
                "copied {} {} for revision {}",
                dependency.kind,
                dependency.name,
                revision.name()
            );
        }
        Ok(())
    }

    /// Make exactly one revision elected and return it.
    ///
    /// Under `Ignore` an elected revision is kept (the newest, if several
    /// are elected). Otherwise the target is a fresh revision (`Auto`) or
    /// the latest ready one; a revision whose dependency copies were never
    /// finished is completed through `create` first. Other elected revisions are recalled before the
    /// target is elected, each flip its own write.
    pub fn elect_revision(&self, referrer: &dyn Referrer) -> Result<Revision> {
        let policy = referrer.update_policy();
        let revisions = self.list(referrer)?;
        let elected: Vec<&Revision> = revisions.iter().filter(|r| r.is_elected()).collect();

        if policy == UpdatePolicy::Ignore
            && let Some((keep, extra)) = elected.split_last()
        {
            for stale in extra {
                self.recall(stale)?;
            }
            return Ok((*keep).clone());
        }

        let target = match policy {
            UpdatePolicy::Auto => self.create(referrer)?,
            UpdatePolicy::Ignore => match revisions.iter().rev().find(|r| r.status.ready) {
                Some(latest) => latest.clone(),
                None => self.create(referrer)?,
            },
        };

        for previous in elected.iter().filter(|r| r.name() != target.name()) {
            self.recall(previous)?;
        }
        if target.is_elected() {
            return Ok(target);
        }

        let mut modified = target.clone();
        modified.elect();
        let winner = self.store.patch_typed(&target, &modified)?;
        log::info!(
            "elected revision {} for {}/{}",
            winner.name(),
            referrer.namespace(),
            referrer.name()
        );
        Ok(winner)
    }

    fn recall(&self, revision: &Revision) -> Result<Revision> {
        let mut modified = revision.clone();
        modified.recall();
        log::info!("recalling revision {}", revision.key());
        Ok(self.store.patch_typed(revision, &modified)?)
    }

    /// Delete revisions beyond the history limit, never an elected one.
    ///
    /// A limit of zero (or below) keeps only the elected revision.
    ///
    /// Returns the names of deleted revisions.
    pub fn trim_revisions(&self, referrer: &dyn Referrer) -> Result<Vec<String>> {
        self.trim(referrer, None)
    }

    fn trim(&self, referrer: &dyn Referrer, keep: Option<&str>) -> Result<Vec<String>> {
        let limit = usize::try_from(referrer.history_limit()).unwrap_or(0);
        let mut revisions = self.list(referrer)?;
        revisions.reverse();

        let mut deleted = Vec::new();
        for revision in revisions.iter().skip(limit) {
            if revision.is_elected() || keep == Some(revision.name()) {
                continue;
            }
            self.store
                .delete_typed::<Revision>(&revision.key())
                .ignore_not_found()?;
            log::debug!("trimmed revision {}", revision.key());
            deleted.push(revision.name().to_string());
        }
        Ok(deleted)
    }

    /// Flip the `stopped` flag of a revision
    pub fn set_stopped(&self, revision: &Revision, stopped: bool) -> Result<Revision> {
        if revision.is_stopped() == stopped {
            return Ok(revision.clone());
        }
        let mut modified = revision.clone();
        modified.set_stopped(stopped);
        Ok(self.store.patch_typed(revision, &modified)?)
    }
}
