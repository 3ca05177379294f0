//! # Overlay
//!
//! Strategic merge of a base workload template with overlay fragments.
//!
//! Maps merge recursively and scalars replace. A `null` in the overlay
//! deletes the key. Lists named in the merge-key table merge element-wise by
//! their key field (containers by `name`, volume mounts by `mountPath`,
//! ports by `containerPort`); an element carrying `"$patch": "delete"`
//! removes the matching base element. Any other list is replaced.
//!
//! A pod template's `spec.containers` is structurally required, so an overlay
//! whose container list is missing, `null` or empty leaves the base
//! containers untouched instead of clearing them.
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//!
//! let base = json!({"spec": {"containers": [{"name": "main", "image": "jupyter"}]}});
//! let proxy = json!({"spec": {"containers": [{"name": "proxy", "image": "envoy"}]}});
//!
//! let merged = overlay::merge(&base, &proxy)?;
//! assert_eq!(merged["spec"]["containers"].as_array().map(Vec::len), Some(2));
//! # Ok::<(), overlay::Error>(())
//! ```

use serde_json::{Map, Value};
use thiserror::Error;

/// Directive key recognized inside overlay objects
pub const PATCH_DIRECTIVE: &str = "$patch";

/// Merge keys for list fields that merge element-wise.
///
/// Any list field not named here is replaced wholesale.
pub const MERGE_KEYS: &[(&str, &str)] = &[
    ("containers", "name"),
    ("initContainers", "name"),
    ("ephemeralContainers", "name"),
    ("volumes", "name"),
    ("env", "name"),
    ("imagePullSecrets", "name"),
    ("volumeMounts", "mountPath"),
    ("ports", "containerPort"),
];

/// Structural problems in an overlay
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("overlay at {path} must be an object")]
    NotAnObject { path: String },

    #[error("element of {path} is missing its merge key {key:?}")]
    MissingMergeKey { path: String, key: &'static str },

    #[error("unknown patch directive {directive:?} at {path}")]
    UnknownDirective { path: String, directive: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Merge key for a list field, if it merges element-wise.
pub fn merge_key(field: &str) -> Option<&'static str> {
    MERGE_KEYS
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, key)| *key)
}

/// Merge `overlay` onto a copy of `base`.
pub fn merge(base: &Value, overlay: &Value) -> Result<Value> {
    let Value::Object(patch) = overlay else {
        return Err(Error::NotAnObject {
            path: "$".to_string(),
        });
    };
    let patch = strip_empty_containers(patch);

    let mut resolved = match base {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    merge_map(&mut resolved, &patch, "$")?;
    Ok(Value::Object(resolved))
}

/// Merge a sequence of overlays in order.
pub fn merge_all<'a>(base: &Value, overlays: impl IntoIterator<Item = &'a Value>) -> Result<Value> {
    overlays
        .into_iter()
        .try_fold(base.clone(), |acc, overlay| merge(&acc, overlay))
}

/// Drop `spec.containers` from a patch when it carries no containers.
fn strip_empty_containers(patch: &Map<String, Value>) -> Map<String, Value> {
    let mut patch = patch.clone();
    if let Some(Value::Object(spec)) = patch.get_mut("spec") {
        let empty = match spec.get("containers") {
            Some(Value::Null) => true,
            Some(Value::Array(items)) => items.is_empty(),
            _ => false,
        };
        if empty {
            log::trace!("ignoring empty spec.containers in overlay");
            spec.remove("containers");
        }
    }
    patch
}

fn merge_map(base: &mut Map<String, Value>, patch: &Map<String, Value>, path: &str) -> Result<()> {
    for (field, value) in patch {
        if field == PATCH_DIRECTIVE {
            continue;
        }
        let field_path = format!("{path}.{field}");
        if value.is_null() {
            base.remove(field);
            continue;
        }

        match (base.get_mut(field), value, merge_key(field)) {
            (Some(Value::Object(existing)), Value::Object(incoming), _) => {
                merge_map(existing, incoming, &field_path)?;
            }
            (Some(Value::Array(existing)), Value::Array(incoming), Some(key)) => {
                merge_list(existing, incoming, key, &field_path)?;
            }
            (None, Value::Array(incoming), Some(key)) => {
                let mut fresh = Vec::new();
                merge_list(&mut fresh, incoming, key, &field_path)?;
                base.insert(field.clone(), Value::Array(fresh));
            }
            _ => {
                base.insert(field.clone(), clean(value));
            }
        }
    }
    Ok(())
}

fn merge_list(base: &mut Vec<Value>, patch: &[Value], key: &'static str, path: &str) -> Result<()> {
    for element in patch {
        let Value::Object(incoming) = element else {
            return Err(Error::NotAnObject {
                path: format!("{path}[]"),
            });
        };
        let Some(id) = incoming.get(key) else {
            return Err(Error::MissingMergeKey {
                path: path.to_string(),
                key,
            });
        };
        let element_path = format!("{path}[{key}={id}]");

        match incoming.get(PATCH_DIRECTIVE).and_then(Value::as_str) {
            Some("delete") => {
                base.retain(|existing| existing.get(key) != Some(id));
                continue;
            }
            Some("merge") | None => {}
            Some(other) => {
                return Err(Error::UnknownDirective {
                    path: element_path,
                    directive: other.to_string(),
                });
            }
        }

        match base.iter_mut().find(|existing| existing.get(key) == Some(id)) {
            Some(Value::Object(existing)) => merge_map(existing, incoming, &element_path)?,
            Some(existing) => *existing = clean(element),
            None => base.push(clean(element)),
        }
    }
    Ok(())
}

/// Copy a value with directives removed.
fn clean(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, v)| *k != PATCH_DIRECTIVE && !v.is_null())
                .map(|(k, v)| (k.clone(), clean(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .filter(|item| item.get(PATCH_DIRECTIVE).and_then(Value::as_str) != Some("delete"))
                .map(clean)
                .collect(),
        ),
        other => other.clone(),
    }
}
