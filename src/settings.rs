use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::render::{ImageCodec, MemoryTieredAssembler, SpillFormat};
use crate::zoom::{ConfigurationError, GestureConfig, TransformState, validate_scale_range};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "pagescroll";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ConfigurationError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_min_scale")]
    pub min_scale: f32,

    #[serde(default = "default_max_scale")]
    pub max_scale: f32,

    /// Overrides the device low-memory probe when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_memory: Option<bool>,

    /// The image decoder cannot hold full-resolution surfaces; always spill
    #[serde(default)]
    pub legacy_decoder: bool,

    #[serde(default)]
    pub spill_format: SpillFormat,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spill_dir: Option<PathBuf>,

    #[serde(default = "default_touch_slop")]
    pub touch_slop: f32,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_min_scale() -> f32 {
    1.0
}

fn default_max_scale() -> f32 {
    5.0
}

fn default_touch_slop() -> f32 {
    8.0
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            min_scale: default_min_scale(),
            max_scale: default_max_scale(),
            low_memory: None,
            legacy_decoder: false,
            spill_format: SpillFormat::default(),
            spill_dir: None,
            touch_slop: default_touch_slop(),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

impl Settings {
    /// Load from the default location; defaults when there is no file
    pub fn load() -> Result<Self, SettingsError> {
        let Some(path) = default_config_path() else {
            warn!("Could not determine config directory, using default settings");
            return Ok(Self::default());
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            debug!("No settings at {path:?}, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings: Settings =
            serde_yaml::from_str(&content).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Loaded settings from {path:?}");

        if settings.version < CURRENT_VERSION {
            migrate_settings(&mut settings);
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let write_error = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(write_error)?;
            }
        }
        fs::write(path, generate_settings_yaml(self)).map_err(write_error)?;
        debug!("Saved settings to {path:?}");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_scale_range(self.min_scale, self.max_scale)
    }

    /// Effective low-memory decision given the device probe's answer
    #[must_use]
    pub fn low_memory_or(&self, probed: bool) -> bool {
        self.low_memory.unwrap_or(probed)
    }

    /// Low-memory decision for an explicit request. A request for low
    /// memory always holds; otherwise the configured value applies.
    #[must_use]
    pub fn low_memory_requested(&self, requested: bool) -> bool {
        requested || self.low_memory_or(false)
    }

    pub fn transform_state(&self) -> Result<TransformState, ConfigurationError> {
        TransformState::new(self.min_scale, self.max_scale)
    }

    #[must_use]
    pub fn gesture_config(&self) -> GestureConfig {
        let mut config = GestureConfig::default();
        if self.touch_slop.is_finite() && self.touch_slop >= 0.0 {
            config.touch_slop = self.touch_slop;
        } else {
            warn!("Ignoring touch_slop {}", self.touch_slop);
        }
        config
    }

    #[must_use]
    pub fn assembler(&self) -> MemoryTieredAssembler<ImageCodec> {
        MemoryTieredAssembler::with_codec(ImageCodec::new(self.spill_format))
            .spill_dir(self.spill_dir.clone())
            .legacy_decoder(self.legacy_decoder)
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(&format!("version: {}\n", settings.version));
    content.push_str(&format!("min_scale: {:?}\n", settings.min_scale));
    content.push_str(&format!("max_scale: {:?}\n", settings.max_scale));
    match settings.low_memory {
        Some(flag) => content.push_str(&format!("low_memory: {flag}\n")),
        None => content.push_str("# low_memory: true  # overrides the device probe\n"),
    }
    content.push_str(&format!("legacy_decoder: {}\n", settings.legacy_decoder));
    let format_str = match settings.spill_format {
        SpillFormat::Jpeg => "jpeg",
        SpillFormat::Png => "png",
    };
    content.push_str(&format!("spill_format: {format_str}\n"));
    match &settings.spill_dir {
        Some(dir) => content.push_str(&format!("spill_dir: {:?}\n", dir.display().to_string())),
        None => content.push_str("# spill_dir: /tmp  # system temp dir when unset\n"),
    }
    content.push_str(&format!("touch_slop: {:?}\n", settings.touch_slop));

    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn save_and_load_preserves_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let settings = Settings {
            min_scale: 0.5,
            max_scale: 8.0,
            low_memory: Some(true),
            legacy_decoder: true,
            spill_format: SpillFormat::Png,
            spill_dir: Some(PathBuf::from("/var/tmp/spill")),
            touch_slop: 12.0,
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "max_scale: 3.0\n").unwrap();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.max_scale, 3.0);
        assert_eq!(settings.min_scale, 1.0);
        assert_eq!(settings.spill_format, SpillFormat::Jpeg);
        assert_eq!(settings.low_memory, None);
    }

    #[test]
    fn inverted_scale_range_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "min_scale: 4.0\nmax_scale: 2.0\n").unwrap();
        assert!(matches!(
            Settings::load_from(&path),
            Err(SettingsError::Invalid(ConfigurationError::InvertedScaleRange { .. }))
        ));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "min_scale: [not, a, number\n").unwrap();
        assert!(matches!(
            Settings::load_from(&path),
            Err(SettingsError::Parse { .. })
        ));
    }

    #[test]
    fn low_memory_override_wins_over_probe() {
        let mut settings = Settings::default();
        assert!(settings.low_memory_or(true));
        settings.low_memory = Some(false);
        assert!(!settings.low_memory_or(true));
    }

    #[test]
    fn explicit_low_memory_request_beats_config() {
        let mut settings = Settings {
            low_memory: Some(false),
            ..Settings::default()
        };
        assert!(settings.low_memory_requested(true));
        assert!(!settings.low_memory_requested(false));

        settings.low_memory = Some(true);
        assert!(settings.low_memory_requested(false));
        settings.low_memory = None;
        assert!(!settings.low_memory_requested(false));
    }

    #[test]
    fn legacy_decoder_selects_spill_tier() {
        let settings = Settings {
            legacy_decoder: true,
            ..Settings::default()
        };
        assert_eq!(
            settings.assembler().tier_for(false),
            crate::render::MemoryTier::Spill
        );
    }
}
