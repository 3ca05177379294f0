mod cli;
mod commands;
mod config;
mod paths;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, ConfigCommand};
use config::StencilConfig;
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: StencilConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: StencilConfig::load()?,
    };

    match cli.command {
        Command::Apply(args) => commands::apply::run(&ctx, &args.file, &args.namespace),
        Command::Reconcile(args) => commands::reconcile::run(&ctx, args.watch, args.jobs),
        Command::Get(args) => commands::get::run(&ctx, &args.kind, args.namespace.as_deref()),
        Command::Status(args) => commands::status::run(&ctx, &args.name, &args.namespace),
        Command::Revisions(cmd) => commands::revisions::run(&ctx, cmd),
        Command::Job(cmd) => commands::job::run(&ctx, cmd),
        Command::Gc => commands::gc::run(&ctx),
        Command::Config(ConfigCommand::Show) => commands::config::show(&ctx),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "stencil", &mut io::stdout());
            Ok(())
        }
    }
}
