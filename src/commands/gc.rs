use anyhow::Result;
use objstore::collect_garbage;

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let store = super::open_store(ctx)?;
    let collected = collect_garbage(&store)?;

    if collected.is_empty() {
        ui::info("Nothing to collect");
        return Ok(());
    }
    for item in &collected {
        ui::dim(&format!("deleted {} {}", item.kind, item.key));
    }
    ui::success(&format!("Collected {} orphaned object(s)", collected.len()));
    Ok(())
}
