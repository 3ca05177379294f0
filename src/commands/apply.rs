use anyhow::{Context as _, Result, bail};
use objstore::{API_VERSION, Object, ObjectStore, RawObject, ResultExt};
use resources::{Dag, validate_dag};
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::Context;
use crate::ui;

/// What applying one object did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Created,
    Updated,
    Unchanged,
}

pub fn run(ctx: &Context, file: &Path, namespace: &str) -> Result<()> {
    let objects = load_manifest(file)?;
    let store = super::open_store(ctx)?;

    for object in objects {
        let label = format!("{} {}", object.kind, object.key());
        match apply_object(&store, object, namespace)? {
            Applied::Created => ui::success(&format!("{label} created")),
            Applied::Updated => ui::success(&format!("{label} updated")),
            Applied::Unchanged => {
                if !ctx.quiet {
                    ui::dim(&format!("{label} unchanged"));
                }
            }
        }
    }
    Ok(())
}

/// Read a JSON or TOML manifest holding one object, a list, or an `objects` list
pub fn load_manifest(path: &Path) -> Result<Vec<RawObject>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read manifest {}", path.display()))?;
    let value: Value = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in {}", path.display()))?,
        _ => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?,
    };
    parse_objects(value)
}

fn parse_objects(value: Value) -> Result<Vec<RawObject>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) if !map.contains_key("kind") => match map.remove("objects") {
            Some(Value::Array(items)) => items,
            _ => bail!("manifest must be an object with a kind, a list, or an `objects` list"),
        },
        other => vec![other],
    };
    items
        .into_iter()
        .map(|item| RawObject::from_value(item).map_err(Into::into))
        .collect()
}

/// Create the object, or merge its fields over the stored one.
///
/// Status is owned by the reconcilers and never overwritten here.
pub fn apply_object(store: &dyn ObjectStore, mut object: RawObject, namespace: &str) -> Result<Applied> {
    if object.metadata.namespace.is_empty() {
        object.metadata.namespace = namespace.to_string();
    }
    if object.api_version.is_empty() {
        object.api_version = API_VERSION.to_string();
    }
    if object.kind == Dag::KIND {
        let dag = Dag::from_raw(object.clone())?;
        validate_dag(&dag).with_context(|| format!("Dag {} rejected", object.key()))?;
    }

    let Some(stored) = store.get(&object.kind, &object.key()).ignore_not_found()? else {
        store.create(object)?;
        return Ok(Applied::Created);
    };

    let mut modified = stored.clone();
    for (field, value) in object.body {
        if field != "status" {
            modified.body.insert(field, value);
        }
    }
    modified.metadata.labels.extend(object.metadata.labels);
    modified.metadata.annotations.extend(object.metadata.annotations);

    if modified == stored {
        return Ok(Applied::Unchanged);
    }
    store.patch(&stored, &modified)?;
    Ok(Applied::Updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use objstore::{MemoryStore, ObjectKey, StoreExt};
    use resources::Template;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_load_toml_objects_list() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pipeline.toml");
        fs::write(
            &path,
            r#"
[[objects]]
kind = "Dag"
metadata = { name = "train" }
spec = { entrypoint = "t1", tasks = [{ name = "t1", templateRef = { name = "trainer" } }] }

[[objects]]
kind = "Execution"
metadata = { name = "run-1", namespace = "ml" }
spec = { dagRef = { name = "train" }, parallelism = 2 }
"#,
        )
        .unwrap();

        let objects = load_manifest(&path).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].kind, "Dag");
        assert_eq!(objects[1].metadata.namespace, "ml");
        assert_eq!(objects[1].body["spec"]["parallelism"], 2);
    }

    #[test]
    fn test_load_json_single_and_array() {
        let tmp = TempDir::new().unwrap();
        let single = tmp.path().join("template.json");
        fs::write(&single, r#"{"kind": "Template", "metadata": {"name": "jupyter"}}"#).unwrap();
        assert_eq!(load_manifest(&single).unwrap().len(), 1);

        let list = tmp.path().join("list.json");
        fs::write(
            &list,
            r#"[{"kind": "Notebook", "metadata": {"name": "a"}}, {"kind": "Notebook", "metadata": {"name": "b"}}]"#,
        )
        .unwrap();
        assert_eq!(load_manifest(&list).unwrap().len(), 2);

        let bad = tmp.path().join("bad.json");
        fs::write(&bad, r#"{"metadata": {"name": "a"}}"#).unwrap();
        assert!(load_manifest(&bad).is_err());
    }

    #[test]
    fn test_apply_creates_then_updates() {
        let store = MemoryStore::new();
        let template = |image: &str| {
            RawObject::from_value(json!({
                "kind": "Template",
                "metadata": {"name": "jupyter"},
                "spec": {"template": {"spec": {"containers": [{"name": "nb", "image": image}]}}}
            }))
            .unwrap()
        };

        assert_eq!(
            apply_object(&store, template("jupyter:1"), "team").unwrap(),
            Applied::Created
        );
        assert_eq!(
            apply_object(&store, template("jupyter:1"), "team").unwrap(),
            Applied::Unchanged
        );
        assert_eq!(
            apply_object(&store, template("jupyter:2"), "team").unwrap(),
            Applied::Updated
        );

        let stored: Template = store.fetch(&ObjectKey::new("team", "jupyter")).unwrap();
        assert_eq!(
            stored.spec.template.spec.containers[0].image.as_deref(),
            Some("jupyter:2")
        );
    }

    #[test]
    fn test_apply_rejects_duplicate_tasks() {
        let store = MemoryStore::new();
        let dag = RawObject::from_value(json!({
            "kind": "Dag",
            "metadata": {"name": "dup"},
            "spec": {"entrypoint": "t1", "tasks": [{"name": "t1"}, {"name": "t1"}]}
        }))
        .unwrap();

        assert!(apply_object(&store, dag, "default").is_err());
        assert_eq!(store.count("Dag").unwrap(), 0);
    }
}
