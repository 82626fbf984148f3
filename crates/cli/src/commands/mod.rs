//! Subcommand implementations.

pub mod catalog;
pub mod config_cmd;
pub mod route;
pub mod run;

use std::path::PathBuf;

use agentflow_config::{AppConfig, Catalog};
use anyhow::Context;

/// Load config and the catalog, honouring a `--catalog` override.
pub fn load(catalog: Option<PathBuf>) -> anyhow::Result<(AppConfig, Catalog)> {
    let mut config = AppConfig::load().context("Failed to load config")?;
    if catalog.is_some() {
        config.catalog_path = catalog;
    }
    let loaded = config.load_catalog().with_context(|| {
        format!(
            "Failed to load catalog (run `agentflow config --init` to create {})",
            config.catalog_file().display()
        )
    })?;
    Ok((config, loaded))
}
