use anyhow::{Context as _, Result};

use crate::Context;
use crate::paths;
use crate::ui;

pub fn show(ctx: &Context) -> Result<()> {
    ui::header("Configuration");

    let file = paths::config_file()?;
    ui::kv("Config file", &file.display().to_string());
    if !file.exists() {
        ui::dim("Not found, using defaults");
    }
    ui::kv("Store", &ctx.config.store_path()?.display().to_string());
    println!();

    let rendered =
        toml::to_string_pretty(&ctx.config).context("Failed to serialize config")?;
    print!("{rendered}");
    Ok(())
}
