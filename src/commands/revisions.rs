use anyhow::{Context as _, Result};
use chrono::Utc;
use colored::Colorize;
use objstore::{ObjectKey, StoreExt};
use resources::{Notebook, Revision};
use revision::Publisher;
use similar::{ChangeTag, TextDiff};

use crate::Context;
use crate::cli::RevisionsCommand;
use crate::ui;

pub fn run(ctx: &Context, cmd: RevisionsCommand) -> Result<()> {
    let store = super::open_store(ctx)?;
    let publisher = Publisher::new(&store);

    match cmd {
        RevisionsCommand::List {
            notebook,
            namespace,
        } => {
            let notebook = load_notebook(&store, &ObjectKey::new(namespace, notebook))?;
            let revisions = publisher.list(&notebook)?;
            if revisions.is_empty() {
                ui::dim("No revisions");
                return Ok(());
            }
            let latest = publisher.latest(&notebook)?.map(|r| r.metadata.name);
            let now = Utc::now();

            ui::header(&format!(
                "Revisions of {} (limit {}, policy {})",
                notebook.metadata.name,
                notebook.spec.revision_history_limit,
                notebook.update_policy()
            ));
            for rev in &revisions {
                let mut flags = Vec::new();
                if rev.is_elected() {
                    flags.push("elected".green().to_string());
                }
                if rev.is_stopped() {
                    flags.push("stopped".dimmed().to_string());
                }
                if latest.as_deref() == Some(rev.metadata.name.as_str()) {
                    flags.push("latest".cyan().to_string());
                }
                println!(
                    "  {:<40} {:<6} {}",
                    rev.metadata.name,
                    ui::age(rev.metadata.creation_timestamp, now),
                    flags.join(" ")
                );
            }
        }
        RevisionsCommand::Diff {
            from,
            to,
            namespace,
        } => {
            let old: Revision = store
                .fetch(&ObjectKey::new(&namespace, &from))
                .with_context(|| format!("Could not load revision {from}"))?;
            let new: Revision = store
                .fetch(&ObjectKey::new(&namespace, &to))
                .with_context(|| format!("Could not load revision {to}"))?;

            ui::header(&format!("{from} -> {to}"));
            let changes = snapshot_diff(&old, &new);
            if changes.is_empty() {
                ui::dim("(snapshots are identical)");
            }
            for (tag, line) in changes {
                match tag {
                    ChangeTag::Delete => println!("  {}", format!("- {line}").red()),
                    ChangeTag::Insert => println!("  {}", format!("+ {line}").green()),
                    ChangeTag::Equal => {}
                }
            }
        }
        RevisionsCommand::Elect {
            notebook,
            namespace,
        } => {
            let notebook = load_notebook(&store, &ObjectKey::new(namespace, notebook))?;
            let elected = publisher.elect_revision(&notebook)?;
            ui::success(&format!(
                "Elected {} for notebook {}",
                elected.metadata.name, notebook.metadata.name
            ));
        }
        RevisionsCommand::Trim {
            notebook,
            namespace,
        } => {
            let notebook = load_notebook(&store, &ObjectKey::new(namespace, notebook))?;
            let deleted = publisher.trim_revisions(&notebook)?;
            for name in &deleted {
                ui::dim(&format!("deleted {name}"));
            }
            ui::success(&format!("Trimmed {} revision(s)", deleted.len()));
        }
    }
    Ok(())
}

fn load_notebook(store: &objstore::SqliteStore, key: &ObjectKey) -> Result<Notebook> {
    store
        .fetch(key)
        .with_context(|| format!("Could not load notebook {key}"))
}

/// Changed lines between two snapshots, without trailing newlines
pub fn snapshot_diff(old: &Revision, new: &Revision) -> Vec<(ChangeTag, String)> {
    TextDiff::from_lines(old.data(), new.data())
        .iter_all_changes()
        .filter(|change| change.tag() != ChangeTag::Equal)
        .map(|change| (change.tag(), change.value().trim_end_matches('\n').to_string()))
        .collect()
}
