//! `agentflow config`: show configuration, write starter files, or check providers.

use std::collections::BTreeMap;
use std::path::Path;

use agentflow_config::{AppConfig, CatalogFile};
use anyhow::Context;

pub fn show() -> anyhow::Result<()> {
    let mut config = AppConfig::load().context("Failed to load config")?;
    let has_key = config.has_api_key();
    config.api_key = None;

    println!("# {}", AppConfig::config_dir().join("config.toml").display());
    println!("# api key: {}", if has_key { "set" } else { "not set" });
    println!("# catalog: {}", config.catalog_file().display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub fn init() -> anyhow::Result<()> {
    let config_dir = AppConfig::config_dir();
    for line in init_files(&config_dir)? {
        println!("{line}");
    }
    Ok(())
}

/// Ping every configured provider. Fails when any of them is unreachable.
pub async fn check() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    let router = agentflow_providers::build_from_config(&config);
    let health = router.health_check_all().await;
    for line in health_lines(&health) {
        println!("{line}");
    }
    if health.values().all(|ok| *ok) {
        Ok(())
    } else {
        anyhow::bail!("one or more providers are unreachable")
    }
}

fn health_lines(health: &BTreeMap<String, bool>) -> Vec<String> {
    health
        .iter()
        .map(|(name, ok)| format!("{name}: {}", if *ok { "ok" } else { "unreachable" }))
        .collect()
}

/// Write `config.toml` and `catalog.toml` into `dir`, keeping existing files.
fn init_files(dir: &Path) -> anyhow::Result<Vec<String>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut report = Vec::new();
    for (name, contents) in [
        ("config.toml", AppConfig::default_toml()),
        ("catalog.toml", CatalogFile::example_toml().to_string()),
    ] {
        let path = dir.join(name);
        if path.exists() {
            report.push(format!("Kept existing {}", path.display()));
        } else {
            std::fs::write(&path, contents)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            report.push(format!("Created {}", path.display()));
        }
    }
    Ok(report)
}
