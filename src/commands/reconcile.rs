use anyhow::Result;
use controller::{Dispatcher, ExecutionReconciler, NotebookReconciler, PassSummary, Reconciler};
use std::thread;
use std::time::{Duration, Instant};

use crate::Context;
use crate::ui;

const MIN_WAIT: Duration = Duration::from_millis(100);

pub fn run(ctx: &Context, watch: bool, jobs: Option<usize>) -> Result<()> {
    let store = super::open_store(ctx)?;
    let runs = ExecutionReconciler::new(&store).with_requeue(ctx.config.requeue());
    let notebooks = NotebookReconciler::new(&store, ctx.config.system_namespace.clone());
    let reconcilers: [&dyn Reconciler; 2] = [&runs, &notebooks];

    let dispatcher = Dispatcher::new(ctx.config.dispatch_options(jobs))?;
    let idle = ctx.config.requeue();

    loop {
        let summary = dispatcher.pass(&reconcilers)?;
        report(ctx, &summary);
        if !watch {
            break;
        }

        let wait = dispatcher
            .next_due()
            .map_or(idle, |due| due.saturating_duration_since(Instant::now()))
            .min(idle)
            .max(MIN_WAIT);
        log::debug!("next pass in {}ms", wait.as_millis());
        thread::sleep(wait);
    }
    Ok(())
}

fn report(ctx: &Context, summary: &PassSummary) {
    for (kind, key, error) in &summary.failed {
        ui::error(&format!("{kind} {key}: {error}"));
    }
    if ctx.quiet {
        return;
    }
    if summary.is_settled() {
        ui::success(&format!("{} object(s) reconciled, all settled", summary.reconciled));
    } else {
        ui::info(&format!(
            "{} reconciled, {} requeued, {} failed, {} waiting",
            summary.reconciled,
            summary.requeued,
            summary.failed.len(),
            summary.waiting
        ));
    }
}
