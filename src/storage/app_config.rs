//! Application config persistence.
//!
//! Handles saving and loading `config.json`.
//! Cross-platform: uses appropriate config directories for each OS.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{SamplingPolicy, SettingsPolicy};
use crate::error::{RelayError, Result};
use crate::relay::{CurveFamily, DEFAULT_FAULT_CURRENT, DEFAULT_LOAD_CURRENT, RelayInputs};
use crate::system::{SystemModel, TrainingConfig};
use crate::utils::tcc_chart::ChartConfig;

// =============================================================================
// Config Path
// =============================================================================

const APP_NAME: &str = "idmt-relay";
const CONFIG_FILE: &str = "config.json";
const MODEL_FILE: &str = "surrogate.json";

/// Get the configuration directory path.
/// - Linux: ~/.config/idmt-relay/
/// - Windows: %APPDATA%\idmt-relay\
pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join(APP_NAME))
        .ok_or_else(|| RelayError::Storage("Could not find config directory".into()))
}

/// Get the full path to the config file.
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE))
}

/// Default location of the trained surrogate weights.
pub fn get_model_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(MODEL_FILE))
}

// =============================================================================
// Storage Structures
// =============================================================================

/// Inputs a fresh session starts from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Minimum fault current at the protected bus (A)
    pub fault_current: f64,
    /// Maximum load current (A)
    pub load_current: f64,
    pub adaptive_mode: bool,
    pub curve: CurveFamily,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            fault_current: DEFAULT_FAULT_CURRENT,
            load_current: DEFAULT_LOAD_CURRENT,
            adaptive_mode: false,
            curve: CurveFamily::Standard,
        }
    }
}

impl StartupConfig {
    pub fn to_inputs(&self) -> Result<RelayInputs> {
        RelayInputs::new(
            self.fault_current,
            self.load_current,
            self.adaptive_mode,
            self.curve,
        )
    }
}

/// Chart appearance, colours as hex strings (e.g. "38BDF8").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredChartConfig {
    pub width: u32,
    pub height: u32,
    /// Lower time axis limit (s)
    pub time_min: f64,
    /// Upper time axis limit (s)
    pub time_max: f64,
    pub background_color: String,
    pub grid_color: String,
    pub curve_color: String,
    pub secondary_curve_color: String,
    pub point_color: String,
    pub text_color: String,
}

impl Default for StoredChartConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            time_min: 0.01,
            time_max: 10.0,
            background_color: "0F172A".to_string(),
            grid_color: "334155".to_string(),
            curve_color: "38BDF8".to_string(),
            secondary_curve_color: "F97316".to_string(),
            point_color: "F8FAFC".to_string(),
            text_color: "94A3B8".to_string(),
        }
    }
}

/// Main configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub startup: StartupConfig,
    pub settings: SettingsPolicy,
    pub sampling: SamplingPolicy,
    pub chart: StoredChartConfig,
    pub system: SystemModel,
    pub training: TrainingConfig,
}

impl AppConfig {
    /// Check every section. Startup currents must be valid inputs.
    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;
        self.sampling.validate()?;
        self.training.validate()?;
        self.startup.to_inputs().map_err(|e| {
            RelayError::InvalidConfig(format!("startup: {}", e))
        })?;

        if self.chart.width == 0 || self.chart.height == 0 {
            return Err(RelayError::InvalidConfig(
                "chart width and height must be non-zero".into(),
            ));
        }
        if !(self.chart.time_min > 0.0 && self.chart.time_min < self.chart.time_max) {
            return Err(RelayError::InvalidConfig(format!(
                "chart time axis must satisfy 0 < time_min < time_max, got {}..{}",
                self.chart.time_min, self.chart.time_max
            )));
        }
        ChartConfig::from_stored(&self.chart)?;

        let system = &self.system;
        if [system.grid_fault_current, system.max_load_current]
            .iter()
            .any(|v| !v.is_finite() || *v <= 0.0)
            || !system.ibr_fault_current.is_finite()
            || system.ibr_fault_current < 0.0
        {
            return Err(RelayError::InvalidConfig(
                "system currents must be positive (IBR contribution may be 0)".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Storage Functions
// =============================================================================

/// Load and validate configuration from `path`. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| RelayError::Storage(format!("Failed to read config: {}", e)))?;

    let config: AppConfig = serde_json::from_str(&content)
        .map_err(|e| RelayError::Storage(format!("Failed to parse config: {}", e)))?;

    config.validate()?;
    Ok(config)
}

/// Save configuration to `path`, creating parent directories.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .map_err(|e| RelayError::Storage(format!("Failed to create config dir: {}", e)))?;
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| RelayError::Storage(format!("Failed to serialize config: {}", e)))?;

    std::fs::write(path, content)
        .map_err(|e| RelayError::Storage(format!("Failed to write config: {}", e)))?;

    Ok(())
}

/// Ensure that the config file at `path` exists, writing defaults if missing.
///
/// Returns `true` when a file was created.
pub fn ensure_config_exists(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    info!(path = %path.display(), "config file not found, writing defaults");
    save_config_to(&AppConfig::default(), path)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.startup.fault_current = 4200.0;
        config.startup.curve = CurveFamily::Extreme;
        config.settings.target_time = 0.4;
        config.chart.curve_color = "FF0000".into();

        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "startup": { "load_current": 950 } }"#).unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.startup.load_current, 950.0);
        assert_eq!(config.startup.fault_current, DEFAULT_FAULT_CURRENT);
        assert_eq!(config.settings, SettingsPolicy::default());
    }

    #[test]
    fn test_invalid_policy_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "settings": { "tms_min": 2.0, "tms_max": 1.0 } }"#).unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, RelayError::InvalidConfig(_)));
    }

    #[test]
    fn test_unbounded_sampling_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "sampling": { "end_psm": 1e30 } }"#).unwrap();

        assert!(matches!(
            load_config_from(&path),
            Err(RelayError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_invalid_training_rejected() {
        let mut config = AppConfig::default();
        config.training.epochs = 0;
        assert!(matches!(
            config.validate(),
            Err(RelayError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_invalid_startup_rejected() {
        let mut config = AppConfig::default();
        config.startup.load_current = 0.0;
        assert!(matches!(
            config.validate(),
            Err(RelayError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_config_from(&path),
            Err(RelayError::Storage(_))
        ));
    }

    #[test]
    fn test_ensure_config_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        assert!(ensure_config_exists(&path).unwrap());
        assert!(path.exists());
        assert!(!ensure_config_exists(&path).unwrap());
    }
}
