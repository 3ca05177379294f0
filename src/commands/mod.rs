pub mod apply;
pub mod config;
pub mod gc;
pub mod get;
pub mod job;
pub mod reconcile;
pub mod revisions;
pub mod status;

use anyhow::{Context as _, Result};
use objstore::SqliteStore;

use crate::Context;

/// Open the store database named by the config
pub fn open_store(ctx: &Context) -> Result<SqliteStore> {
    let path = ctx.config.store_path()?;
    log::debug!("Opening store at {}", path.display());
    SqliteStore::open(&path).with_context(|| format!("Could not open store {}", path.display()))
}
