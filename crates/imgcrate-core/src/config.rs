use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ops::Interpolation;

/// Version written into every config file.
pub const CURRENT_CONFIG_VERSION: &str = "1.0.0";
/// Oldest config file version that can still be loaded.
pub const MIN_CONFIG_VERSION: &str = "1.0.0";
/// Largest edge accepted for any target size unless configured otherwise.
pub const DEFAULT_MAX_DIMENSION: u32 = 16384;

/// Engine-wide tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Live-preview debounce window in milliseconds.
    pub debounce_ms: u64,
    /// Largest accepted edge for crop, resize and resample targets.
    pub max_dimension: u32,
    /// Interpolation seeded into a fresh editor's parameter record.
    pub default_interpolation: Interpolation,
    /// Keep the last decoded watermark image between renders.
    pub cache_watermark_assets: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 16,
            max_dimension: DEFAULT_MAX_DIMENSION,
            default_interpolation: Interpolation::Bilinear,
            cache_watermark_assets: true,
        }
    }
}

/// On-disk wrapper carrying the format version.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub config: EngineConfig,
}

impl EngineConfig {
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = ConfigFile {
            version: CURRENT_CONFIG_VERSION.to_string(),
            config: self.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Parse a config file body, checking its version first.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_str(json)?;
        let version = raw
            .get("version")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CoreError::InvalidConfigFile("missing version field".into()))?;
        check_version(version)?;

        let file: ConfigFile = serde_json::from_value(raw)?;
        Ok(file.config)
    }
}

fn parse_version(s: &str) -> Result<semver::Version> {
    semver::Version::parse(s)
        .map_err(|e| CoreError::InvalidConfigFile(format!("bad version {s:?}: {e}")))
}

fn check_version(got: &str) -> Result<()> {
    let version = parse_version(got)?;
    let max = parse_version(CURRENT_CONFIG_VERSION)?;
    let min = parse_version(MIN_CONFIG_VERSION)?;

    // patch releases stay readable
    if (version.major, version.minor) > (max.major, max.minor) {
        return Err(CoreError::VersionTooNew {
            got: got.to_string(),
            max: CURRENT_CONFIG_VERSION.to_string(),
        });
    }
    if version < min {
        return Err(CoreError::VersionTooOld {
            got: got.to_string(),
            min: MIN_CONFIG_VERSION.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.debounce_ms, 16);
        assert_eq!(config.max_dimension, 16384);
        assert!(config.cache_watermark_assets);
    }

    #[test]
    fn test_patch_version_is_accepted() {
        let json = r#"{"version": "1.0.7", "config": {"debounceMs": 40}}"#;
        let config = EngineConfig::from_json(json).unwrap();
        assert_eq!(config.debounce_ms, 40);
        assert_eq!(config.max_dimension, 16384);
    }

    #[test]
    fn test_minor_bump_is_too_new() {
        let json = r#"{"version": "1.1.0", "config": {}}"#;
        assert!(matches!(
            EngineConfig::from_json(json),
            Err(CoreError::VersionTooNew { .. })
        ));
    }

    #[test]
    fn test_garbled_version() {
        let json = r#"{"version": "one", "config": {}}"#;
        assert!(matches!(
            EngineConfig::from_json(json),
            Err(CoreError::InvalidConfigFile(_))
        ));
    }
}
