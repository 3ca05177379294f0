//! Centralized path resolution for stencil
//!
//! # Environment Variables
//!
//! - `STENCIL_CONFIG_DIR` - Override config directory
//! - `STENCIL_STATE_DIR` - Override state directory (holds the store database)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `STENCIL_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/stencil` (if set)
//! 3. `~/.config/stencil`
//!
//! For state_dir():
//! 1. `STENCIL_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/stencil` (if set)
//! 3. `~/.local/state/stencil`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "STENCIL_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "STENCIL_STATE_DIR";

/// Name of the config file inside the config directory
pub const CONFIG_FILE: &str = "stencil.toml";

/// Get the stencil config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("stencil");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("stencil");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Get the stencil state directory path
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join("stencil");
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join("stencil");
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Path of the config file
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
