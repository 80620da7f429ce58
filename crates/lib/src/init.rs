//! Initialize the configuration directory: create ~/.hookchat, a default config, and an empty
//! chatbot store.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config;

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with `{}` if missing.
/// - Writes an empty chatbot store (`[]`) at the resolved store path if missing.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let (cfg, _) = config::load_config(Some(config_path.to_path_buf()))?;
    let store_path = config::resolve_store_path(&cfg, config_path);
    if !store_path.exists() {
        if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating store directory {}", parent.display()))?;
        }
        std::fs::write(&store_path, b"[]")
            .with_context(|| format!("writing empty chatbot store to {}", store_path.display()))?;
        log::info!("created chatbot store at {}", store_path.display());
    } else {
        log::debug!("chatbot store already exists at {}, skipping", store_path.display());
    }

    Ok(config_dir.to_path_buf())
}
