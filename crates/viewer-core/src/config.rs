//! Optional viewer configuration, read from a JSON file.

use crate::layout::DEFAULT_PAGE_GAP;
use crate::thumbnails::ThumbnailSpec;
use crate::zoom::ZoomPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "pdf-viewer";
const CONFIG_FILE: &str = "config.json";

/// Upper bounds for user-supplied zoom settings.
const MAX_ZOOM_CEILING: f32 = 16.0;
const MAX_BASE_SCALE: f32 = 8.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub page_gap: f32,
    pub zoom: ZoomPolicy,
    pub thumbnails: ThumbnailSpec,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            page_gap: DEFAULT_PAGE_GAP,
            zoom: ZoomPolicy::default(),
            thumbnails: ThumbnailSpec::default(),
        }
    }
}

impl ViewerConfig {
    /// `<config dir>/pdf-viewer/config.json`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Read and validate a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;

        config.validate()?;
        Ok(config)
    }

    /// Like [`ViewerConfig::load`] on the default path, falling back to the
    /// defaults (with a warning) on any error.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };

        match Self::load(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("ignoring configuration: {err}");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let zoom = &self.zoom;

        if !(zoom.min > 0.0 && zoom.max > 0.0) {
            return Err(ConfigError::Invalid("zoom bounds must be positive".into()));
        }
        if zoom.min > zoom.max {
            return Err(ConfigError::Invalid(format!(
                "zoom.min ({}) is greater than zoom.max ({})",
                zoom.min, zoom.max
            )));
        }
        if zoom.step.is_nan() || zoom.step <= 1.0 {
            return Err(ConfigError::Invalid("zoom.step must be greater than 1".into()));
        }
        if zoom.max > MAX_ZOOM_CEILING {
            return Err(ConfigError::Invalid(format!(
                "zoom.max ({}) must not exceed {MAX_ZOOM_CEILING}",
                zoom.max
            )));
        }
        if zoom.base_scale.is_nan() || zoom.base_scale <= 0.0 {
            return Err(ConfigError::Invalid("zoom.base_scale must be positive".into()));
        }
        if zoom.base_scale > MAX_BASE_SCALE {
            return Err(ConfigError::Invalid(format!(
                "zoom.base_scale ({}) must not exceed {MAX_BASE_SCALE}",
                zoom.base_scale
            )));
        }
        if self.page_gap.is_nan() || self.page_gap < 0.0 {
            return Err(ConfigError::Invalid("page_gap must not be negative".into()));
        }
        if self.thumbnails.width == 0 {
            return Err(ConfigError::Invalid("thumbnails.width must be at least 1".into()));
        }
        if self.thumbnails.scale.is_nan() || self.thumbnails.scale <= 0.0 {
            return Err(ConfigError::Invalid("thumbnails.scale must be positive".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, contents).expect("write config");
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().expect("temp dir");

        let config = ViewerConfig::load(&dir.path().join("nope.json")).expect("load");

        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.page_gap, 20.0);
        assert_eq!(config.zoom.step, 1.25);
        assert_eq!(config.thumbnails.width, 120);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(&dir, r#"{ "page_gap": 8, "zoom": { "base_scale": 2.0 } }"#);

        let config = ViewerConfig::load(&path).expect("load");

        assert_eq!(config.page_gap, 8.0);
        assert_eq!(config.zoom.base_scale, 2.0);
        assert_eq!(config.zoom.max, 5.0);
        assert_eq!(config.thumbnails, ThumbnailSpec::default());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(&dir, "{ page_gap: ");

        assert!(matches!(ViewerConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn inverted_zoom_bounds_are_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(&dir, r#"{ "zoom": { "min": 4.0, "max": 2.0 } }"#);

        assert!(matches!(ViewerConfig::load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_degenerate_values() {
        let mut config = ViewerConfig::default();
        config.zoom.step = 1.0;
        assert!(config.validate().is_err());

        let mut config = ViewerConfig::default();
        config.page_gap = -1.0;
        assert!(config.validate().is_err());

        let mut config = ViewerConfig::default();
        config.thumbnails.width = 0;
        assert!(config.validate().is_err());

        let mut config = ViewerConfig::default();
        config.zoom.max = 100.0;
        assert!(config.validate().is_err());

        let mut config = ViewerConfig::default();
        config.zoom.base_scale = 50.0;
        assert!(config.validate().is_err());

        assert!(ViewerConfig::default().validate().is_ok());
    }
}
