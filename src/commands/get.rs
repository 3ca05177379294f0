use anyhow::{Result, bail};
use chrono::Utc;
use colored::Colorize;
use objstore::{ListParams, Object, ObjectStore, RawObject};
use resources::{Dag, Execution, Job, Notebook, Pod, PodDefault, Revision, Template};

use crate::Context;
use crate::ui;

const KINDS: [&str; 8] = [
    Dag::KIND,
    Execution::KIND,
    Template::KIND,
    PodDefault::KIND,
    Revision::KIND,
    Notebook::KIND,
    Job::KIND,
    Pod::KIND,
];

pub fn run(ctx: &Context, kind: &str, namespace: Option<&str>) -> Result<()> {
    let kind = resolve_kind(kind)?;
    let store = super::open_store(ctx)?;
    let objects = list(&store, kind, namespace)?;

    if objects.is_empty() {
        ui::dim(&format!("No {kind} objects found"));
        return Ok(());
    }

    let now = Utc::now();
    println!(
        "{:<16} {:<32} {:<6} {}",
        "NAMESPACE".bold(),
        "NAME".bold(),
        "AGE".bold(),
        "SUMMARY".bold()
    );
    for object in &objects {
        println!(
            "{:<16} {:<32} {:<6} {}",
            object.metadata.namespace,
            object.metadata.name,
            ui::age(object.metadata.creation_timestamp, now),
            summary(object)
        );
        if ctx.verbose > 0 {
            for (key, value) in &object.metadata.labels {
                ui::dim(&format!("{key}={value}"));
            }
        }
    }
    Ok(())
}

/// Map a user-typed kind ("dags", "poddefault", "Job") to its stored name
pub fn resolve_kind(input: &str) -> Result<&'static str> {
    let lower = input.to_ascii_lowercase();
    let singular = lower.strip_suffix('s').unwrap_or(&lower);
    match KINDS
        .iter()
        .find(|kind| kind.to_ascii_lowercase() == lower || kind.to_ascii_lowercase() == singular)
    {
        Some(kind) => Ok(*kind),
        None => bail!("unknown kind {input:?}; expected one of {}", KINDS.join(", ")),
    }
}

fn list(store: &dyn ObjectStore, kind: &str, namespace: Option<&str>) -> Result<Vec<RawObject>> {
    let mut params = ListParams::default();
    if let Some(ns) = namespace {
        params = params.namespace(ns);
    }
    Ok(store.list(kind, &params)?)
}

/// One-line, kind-specific description of an object
fn summary(object: &RawObject) -> String {
    let spec = object.body.get("spec");
    let status = object.body.get("status");
    let field = |value: Option<&serde_json::Value>, name: &str| {
        value
            .and_then(|v| v.get(name))
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    };

    match object.kind.as_str() {
        "Execution" => {
            let completed = field(status, "completed").as_bool().unwrap_or(false);
            let succeeded = field(status, "succeeded").as_bool().unwrap_or(false);
            ui::outcome(completed, succeeded).to_string()
        }
        "Revision" => {
            if field(spec, "elected").as_bool().unwrap_or(false) {
                "elected".green().to_string()
            } else {
                String::new()
            }
        }
        "Notebook" | "Pod" => {
            let phase = field(status, "phase");
            ui::phase(phase.as_str().unwrap_or_default()).to_string()
        }
        "Dag" => {
            let tasks = field(spec, "tasks").as_array().map_or(0, Vec::len);
            format!("{tasks} task(s)")
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_kind() {
        assert_eq!(resolve_kind("dag").unwrap(), "Dag");
        assert_eq!(resolve_kind("Executions").unwrap(), "Execution");
        assert_eq!(resolve_kind("poddefaults").unwrap(), "PodDefault");
        assert_eq!(resolve_kind("POD").unwrap(), "Pod");
        assert!(resolve_kind("deployment").is_err());
    }

    #[test]
    fn test_summary() {
        colored::control::set_override(false);
        let dag = RawObject::from_value(serde_json::json!({
            "kind": "Dag",
            "metadata": {"name": "d"},
            "spec": {"tasks": [{"name": "a"}, {"name": "b"}]}
        }))
        .unwrap();
        assert_eq!(summary(&dag), "2 task(s)");

        let run = RawObject::from_value(serde_json::json!({
            "kind": "Execution",
            "metadata": {"name": "r"},
            "status": {"completed": true, "succeeded": true}
        }))
        .unwrap();
        assert_eq!(summary(&run), "succeeded");
    }
}
