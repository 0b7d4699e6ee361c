use crate::store::DEFAULT_CHECKPOINT_INTERVAL;
use crate::view::ViewOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Free-form label for the loaded profile.
    pub profile_name: String,
    pub scan: ScanRules,
    pub tags: TagRules,
    pub display: DisplayRules,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            profile_name: "base".to_string(),
            scan: ScanRules::default(),
            tags: TagRules::default(),
            display: DisplayRules::default(),
        }
    }
}

impl ViewerConfig {
    pub fn view_options(&self) -> ViewOptions {
        ViewOptions {
            checkpoint_interval: self.scan.checkpoint_interval.max(1),
            tag_slots: self.tags.slots,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanRules {
    /// Records examined between two progress checkpoints
    pub checkpoint_interval: usize,
}

impl Default for ScanRules {
    fn default() -> Self {
        Self {
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagRules {
    pub slots: usize,
}

impl Default for TagRules {
    fn default() -> Self {
        Self { slots: 8 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DisplayRules {
    /// Rows printed per view; `None` prints all of them
    pub max_rows: Option<usize>,
    /// Column names to print, in order. Empty means every column.
    pub show_columns: Vec<String>,
}

pub fn load_config(path: Option<&Path>) -> Result<ViewerConfig, ConfigError> {
    if let Some(path) = path {
        load_config_from_path(path)
    } else {
        Ok(default_config().clone())
    }
}

pub fn load_config_from_path(path: &Path) -> Result<ViewerConfig, ConfigError> {
    let path_display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path_display.clone(),
        source,
    })?;

    toml::from_str::<ViewerConfig>(&raw).map_err(|source| ConfigError::Parse {
        path: path_display,
        source,
    })
}

pub fn default_config() -> &'static ViewerConfig {
    static DEFAULT_CONFIG: LazyLock<ViewerConfig> = LazyLock::new(ViewerConfig::default);
    &DEFAULT_CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let cfg: ViewerConfig = toml::from_str("[tags]\nslots = 3\n").unwrap();
        assert_eq!(cfg.tags.slots, 3);
        assert_eq!(cfg.scan.checkpoint_interval, DEFAULT_CHECKPOINT_INTERVAL);
        assert_eq!(cfg.profile_name, "base");
    }

    #[test]
    fn test_zero_checkpoint_interval_is_clamped() {
        let mut cfg = ViewerConfig::default();
        cfg.scan.checkpoint_interval = 0;
        assert_eq!(cfg.view_options().checkpoint_interval, 1);
    }
}
