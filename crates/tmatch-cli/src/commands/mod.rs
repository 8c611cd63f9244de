//! CLI subcommands and the helpers they share.

pub mod batch;
pub mod config;
pub mod hash;
pub mod verify;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use tmatch_core::{EngineConfig, InMemoryDuplicateStore};

/// Output format for verification results.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary
    Text,
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tmatch")
        .join("config.json")
}

/// Load the config from `--config`, else the per-user file, else defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<EngineConfig> {
    if let Some(path) = config_path {
        return Ok(EngineConfig::from_file(Path::new(path))?);
    }
    let path = default_config_path();
    if path.exists() {
        debug!("Loading config from {}", path.display());
        Ok(EngineConfig::from_file(&path)?)
    } else {
        Ok(EngineConfig::default())
    }
}

/// Store backed by a file of previously financed invoice hashes, one per line.
pub fn load_seen_hashes(path: &Path) -> anyhow::Result<Arc<InMemoryDuplicateStore>> {
    let hashes: Vec<String> = if path.exists() {
        fs::read_to_string(path)?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };
    debug!("Loaded {} seen hashes from {}", hashes.len(), path.display());
    Ok(Arc::new(InMemoryDuplicateStore::with_hashes(hashes)))
}

pub fn save_seen_hashes(path: &Path, store: &InMemoryDuplicateStore) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut content = store.hashes().join("\n");
    content.push('\n');
    fs::write(path, content)?;
    Ok(())
}

pub fn read_document(path: &Path) -> anyhow::Result<Vec<u8>> {
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }
    Ok(fs::read(path)?)
}
