//! Configuration loading and config file resolution
//!
//! The installation reads one TOML file at startup. Every field has a
//! built-in default, so a missing file at the default location is not fatal.
//!
//! Config file resolution order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`GVP_CONFIG`)
//! 3. Platform config directory (`<config_dir>/gvp/config.toml`)
//! 4. Built-in defaults (fallback)

use crate::fade_curves::FadeCurve;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "GVP_CONFIG";

/// Upper bound for any configured duration (one day)
pub const MAX_DURATION_SECONDS: f64 = 86_400.0;

/// Installation configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Scene document (JSON)
    pub scenes_file: PathBuf,

    /// Folder that clip and soundtrack paths are relative to
    pub media_root: PathBuf,

    /// How long before a clip's display duration ends to start preparing the next clip
    ///
    /// 0 starts preparing exactly at the boundary.
    pub preload_buffer_seconds: f64,

    /// Real-time wait after a scene activates before the first clip is prepared
    pub initial_buffer_delay_seconds: f64,

    /// Real-time wait between the first clip starting and the soundtrack starting
    pub soundtrack_delay_seconds: f64,

    /// Scheduler ticks per second
    pub tick_rate_hz: u32,

    /// Scene index to activate first
    pub start_scene: usize,

    /// Fixed shuffle seed for reproducible rehearsals
    pub shuffle_seed: Option<u64>,

    /// Event bus channel capacity
    pub event_capacity: usize,

    pub fader: FaderConfig,
    pub surfaces: SurfaceConfig,
    pub soundtrack: SoundtrackConfig,
    pub rehearsal: RehearsalConfig,
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            scenes_file: PathBuf::from("scenes.json"),
            media_root: PathBuf::from("media"),
            preload_buffer_seconds: 0.0,
            initial_buffer_delay_seconds: 0.0,
            soundtrack_delay_seconds: 4.0,
            tick_rate_hz: 60,
            start_scene: 0,
            shuffle_seed: None,
            event_capacity: 256,
            fader: FaderConfig::default(),
            surfaces: SurfaceConfig::default(),
            soundtrack: SoundtrackConfig::default(),
            rehearsal: RehearsalConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Opacity fader settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaderConfig {
    /// Length of each fade
    pub duration_seconds: f64,

    /// Wait before a fade-in starts
    pub delay_seconds: f64,

    pub curve: FadeCurve,
}

impl Default for FaderConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 1.0,
            delay_seconds: 0.0,
            curve: FadeCurve::Linear,
        }
    }
}

/// Mirrored render targets per playback buffer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub duplicates_a: usize,
    pub duplicates_b: usize,
}

/// Soundtrack playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundtrackConfig {
    /// Output volume (0.0 to 1.0)
    pub volume: f32,
}

impl Default for SoundtrackConfig {
    fn default() -> Self {
        Self { volume: 0.5 }
    }
}

/// Simulated decoder timing used by the headless rehearsal backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RehearsalConfig {
    pub prepare_latency_ms: u64,
    pub jitter_ms: u64,
    pub first_frame_latency_ms: u64,
}

impl Default for RehearsalConfig {
    fn default() -> Self {
        Self {
            prepare_latency_ms: 120,
            jitter_ms: 0,
            first_frame_latency_ms: 16,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl TomlConfig {
    /// Parse and validate configuration text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file; relative paths inside it resolve against its folder
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// Make `scenes_file`, `media_root` and `logging.file` absolute under `base`
    pub fn resolve_relative_to(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        rebase(&mut self.scenes_file);
        rebase(&mut self.media_root);
        if let Some(file) = self.logging.file.as_mut() {
            rebase(file);
        }
    }

    /// Reject values the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("preload_buffer_seconds", self.preload_buffer_seconds),
            ("initial_buffer_delay_seconds", self.initial_buffer_delay_seconds),
            ("soundtrack_delay_seconds", self.soundtrack_delay_seconds),
            ("fader.duration_seconds", self.fader.duration_seconds),
            ("fader.delay_seconds", self.fader.delay_seconds),
        ];
        for (name, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!(
                    "{} must be a non-negative number (got {})",
                    name, value
                )));
            }
            if value > MAX_DURATION_SECONDS {
                return Err(Error::Config(format!(
                    "{} must be at most {} seconds (got {})",
                    name, MAX_DURATION_SECONDS, value
                )));
            }
        }

        if self.tick_rate_hz == 0 || self.tick_rate_hz > 1000 {
            return Err(Error::Config(format!(
                "tick_rate_hz must be between 1 and 1000 (got {})",
                self.tick_rate_hz
            )));
        }
        if !(0.0..=1.0).contains(&self.soundtrack.volume) {
            return Err(Error::Config(format!(
                "soundtrack.volume must be between 0.0 and 1.0 (got {})",
                self.soundtrack.volume
            )));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Where the config file comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Named explicitly (CLI or environment); must exist
    Explicit(PathBuf),
    /// Found at the platform default location
    Default(PathBuf),
    /// No file; built-in defaults
    BuiltIn,
}

/// Resolve the config file following the documented priority order
pub fn resolve_config_source(cli_arg: Option<&Path>) -> ConfigSource {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return ConfigSource::Explicit(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return ConfigSource::Explicit(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    if let Some(path) = default_config_path() {
        if path.exists() {
            return ConfigSource::Default(path);
        }
    }

    // Priority 4: Built-in defaults
    ConfigSource::BuiltIn
}

/// Platform default config file path (`~/.config/gvp/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("gvp").join("config.toml"))
}

/// Load configuration from the resolved source
///
/// An explicitly named file must exist and parse. Without one, built-in
/// defaults are used and a warning is logged.
pub fn load_config(source: &ConfigSource) -> Result<TomlConfig> {
    match source {
        ConfigSource::Explicit(path) | ConfigSource::Default(path) => {
            let config = TomlConfig::load(path)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        ConfigSource::BuiltIn => {
            warn!("No configuration file found; using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}
