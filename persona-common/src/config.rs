//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the training root folder
pub const ROOT_FOLDER_ENV: &str = "PERSONA_ROOT_FOLDER";

/// Environment variable pointing at an explicit config file
pub const CONFIG_PATH_ENV: &str = "PERSONA_CONFIG";

/// Application directory name used under the OS config/data folders
const APP_DIR: &str = "persona-trainer";

/// TOML configuration file contents
///
/// Every section has defaults, so an empty file (or no file) is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Training root folder; persona directories live directly below it
    pub root_folder: Option<PathBuf>,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// HTTP listener configuration
    pub server: ServerConfig,
    /// Acceptance bars and segment limits
    pub thresholds: TrainingThresholds,
    /// External tool locations
    pub tools: ToolsConfig,
    /// Optional replacement scoring tables (parsed by the trainer)
    pub scoring: ScoringOverrides,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "persona_trainer=info,tower_http=info".to_string(),
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5730,
        }
    }
}

/// Suitability acceptance bars (0-100 scale) and voice segment limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingThresholds {
    /// Minimum score for directly uploaded audio
    pub audio_acceptance: f64,
    /// Minimum score for video files
    pub video_acceptance: f64,
    /// Minimum score for audio extracted from video clips
    pub extracted_audio_acceptance: f64,
    /// Minimum length of an extracted voice segment, in seconds
    pub min_voice_segment_seconds: f64,
}

impl Default for TrainingThresholds {
    fn default() -> Self {
        Self {
            audio_acceptance: 40.0,
            video_acceptance: 40.0,
            extracted_audio_acceptance: 30.0,
            min_voice_segment_seconds: 3.0,
        }
    }
}

impl TrainingThresholds {
    /// Reject bars outside the score scale and non-positive segment lengths
    pub fn validate(&self) -> Result<()> {
        for (name, bar) in [
            ("audio_acceptance", self.audio_acceptance),
            ("video_acceptance", self.video_acceptance),
            ("extracted_audio_acceptance", self.extracted_audio_acceptance),
        ] {
            if !(0.0..=100.0).contains(&bar) {
                return Err(Error::Config(format!(
                    "{} must be within 0-100, got {}",
                    name, bar
                )));
            }
        }
        if !(self.min_voice_segment_seconds > 0.0) {
            return Err(Error::Config(format!(
                "min_voice_segment_seconds must be positive, got {}",
                self.min_voice_segment_seconds
            )));
        }
        Ok(())
    }
}

/// External tool locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// ffmpeg executable (name on PATH or absolute path)
    pub ffmpeg: String,
    /// ffprobe executable (name on PATH or absolute path)
    pub ffprobe: String,
    /// Frame inspector command line; the frame path is appended as the last argument
    pub frame_inspector: Option<Vec<String>>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            frame_inspector: None,
        }
    }
}

/// Raw scoring table overrides, one per modality
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringOverrides {
    pub audio: Option<toml::Value>,
    pub video: Option<toml::Value>,
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config `root_folder`
/// 4. OS-dependent default
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// Location of the config file: `PERSONA_CONFIG`, else the per-user config dir
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// Load and validate a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    config.thresholds.validate()?;
    Ok(config)
}

/// Load the config from its default location, or defaults when no file exists
pub fn load_config() -> Result<TomlConfig> {
    match default_config_path() {
        Some(path) if path.exists() => {
            tracing::debug!(path = %path.display(), "Loading configuration file");
            load_toml_config(&path)
        }
        _ => Ok(TomlConfig::default()),
    }
}

/// Write a config file, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR).join("training"))
        .unwrap_or_else(|| PathBuf::from("./persona_training"))
}
