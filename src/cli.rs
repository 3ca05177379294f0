use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stencil")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Template revisions, overlays and task-graph runs", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create or update objects from a JSON or TOML manifest
    Apply(ApplyArgs),

    /// Reconcile every execution and notebook
    Reconcile(ReconcileArgs),

    /// List objects of a kind
    Get(GetArgs),

    /// Show the task-by-task status of an execution
    Status(StatusArgs),

    /// Inspect and manage notebook revisions
    #[command(subcommand)]
    Revisions(RevisionsCommand),

    /// Report job outcomes (stands in for the workload scheduler)
    #[command(subcommand)]
    Job(JobCommand),

    /// Delete objects whose owners no longer exist
    Gc,

    /// Show configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Manifest file (.json or .toml); a single object or a list
    #[arg(short, long)]
    pub file: PathBuf,

    /// Namespace for objects that don't set one
    #[arg(short, long, default_value = "default")]
    pub namespace: String,
}

#[derive(Parser)]
pub struct ReconcileArgs {
    /// Keep reconciling until interrupted
    #[arg(short, long)]
    pub watch: bool,

    /// Worker threads (overrides the config file)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Parser)]
pub struct GetArgs {
    /// Object kind, e.g. dag, execution, revision
    pub kind: String,

    /// Restrict to one namespace
    #[arg(short, long)]
    pub namespace: Option<String>,
}

#[derive(Parser)]
pub struct StatusArgs {
    /// Execution name
    pub name: String,

    #[arg(short, long, default_value = "default")]
    pub namespace: String,
}

#[derive(Subcommand)]
pub enum RevisionsCommand {
    /// List a notebook's revisions, oldest first
    List {
        /// Notebook name
        notebook: String,

        #[arg(short, long, default_value = "default")]
        namespace: String,
    },

    /// Show the snapshot difference between two revisions
    Diff {
        /// Older revision
        from: String,

        /// Newer revision
        to: String,

        #[arg(short, long, default_value = "default")]
        namespace: String,
    },

    /// Elect a revision for a notebook per its update policy
    Elect {
        /// Notebook name
        notebook: String,

        #[arg(short, long, default_value = "default")]
        namespace: String,
    },

    /// Delete revisions beyond the notebook's history limit
    Trim {
        /// Notebook name
        notebook: String,

        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
}

#[derive(Subcommand)]
pub enum JobCommand {
    /// Mark a job as succeeded
    Complete {
        /// Job name
        name: String,

        #[arg(short, long, default_value = "default")]
        namespace: String,
    },

    /// Mark a job as failed
    Fail {
        /// Job name
        name: String,

        #[arg(short, long, default_value = "default")]
        namespace: String,

        /// Failure reason recorded on the job
        #[arg(long, default_value = "Failed")]
        reason: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show config file location and effective values
    Show,
}
