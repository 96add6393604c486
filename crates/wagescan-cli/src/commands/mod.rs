//! Subcommands of the `wagescan` binary.

pub mod batch;
pub mod classify;
pub mod config;
pub mod process;

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use wagescan_core::WagescanConfig;

/// Location of the user configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wagescan")
        .join("config.json")
}

/// Load the configuration given with `--config`, else the user
/// configuration file if one exists, else the defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<WagescanConfig> {
    if let Some(path) = config_path {
        return WagescanConfig::from_file(Path::new(path))
            .with_context(|| format!("Failed to load config from {}", path));
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Using config file {}", default_path.display());
        return WagescanConfig::from_file(&default_path)
            .with_context(|| format!("Failed to load config from {}", default_path.display()));
    }

    Ok(WagescanConfig::default())
}
