use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

// Default value functions for serde
fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub text: TextConfig,
    #[serde(default)]
    pub meta: MetaConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub surface: SurfaceConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextConfig {
    /// Join all pages into one whitespace-collapsed string
    #[serde(default)]
    pub merge_pages: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaConfig {
    /// Coerce creation/modification dates into timestamps
    #[serde(default)]
    pub parse_dates: bool,
    /// Which source wins when both the info dictionary and XMP carry a date
    #[serde(default)]
    pub date_priority: DatePriority,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePriority {
    #[default]
    Xmp,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Return a `data:image/png;base64,` URL instead of PNG bytes
    #[serde(default)]
    pub to_data_url: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            to_data_url: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceConfig {
    #[serde(default)]
    pub backend: SurfaceBackend,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceBackend {
    /// Host document first, then the native module on a server process
    #[default]
    Auto,
    Native,
    Disabled,
}

impl ExtractionConfig {
    /// Load config from a YAML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: ExtractionConfig =
            serde_yaml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        if !(config.render.scale.is_finite() && config.render.scale > 0.0) {
            return Err(Error::Config(format!(
                "render.scale must be a positive number, got {}",
                config.render.scale
            )));
        }
        Ok(config)
    }

    /// Load config with fallback to default
    pub fn load_with_fallback(path: Option<&Path>) -> Self {
        match path {
            Some(p) => Self::load_from_file(p).unwrap_or_else(|e| {
                warn!(path = %p.display(), error = %e, "failed to load config, using defaults");
                Self::default()
            }),
            None => Self::default(),
        }
    }
}
