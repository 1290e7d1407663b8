//! Config discovery and result files

use anyhow::{Context, Result};
use pdflayer_core::ExtractionConfig;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// `<config_dir>/pdflayer/config.yaml`, when the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pdflayer").join("config.yaml"))
}

/// The explicit path if given, else the default location if a file exists there
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|path| path.exists()),
    }
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    /// The file could not be loaded; defaults are in effect
    Fallback { path: PathBuf, error: String },
    Default,
}

/// Loads `path` if given, falling back to defaults when it cannot be read
pub fn load_config(path: Option<&Path>) -> (ExtractionConfig, ConfigOrigin) {
    let Some(path) = path else {
        return (ExtractionConfig::default(), ConfigOrigin::Default);
    };
    match ExtractionConfig::load_from_file(path) {
        Ok(config) => (config, ConfigOrigin::File(path.to_path_buf())),
        Err(e) => (
            ExtractionConfig::default(),
            ConfigOrigin::Fallback {
                path: path.to_path_buf(),
                error: e.to_string(),
            },
        ),
    }
}

/// Pretty JSON to `output`, or to stdout without one
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("💾 Results saved to: {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// `<stem>_page<N>.png` next to the input
pub fn default_png_path(input: &Path, page: u32) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{stem}_page{page}.png"))
}
