//! Configuration file support for cprtrack.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/cprtrack/config.toml`.

use crate::{Error, Result, TimerSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub timers: TimerConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Countdown intervals a new code starts with
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TimerConfig {
    #[serde(default = "default_rhythm_check_interval")]
    pub rhythm_check_interval_seconds: u32,

    #[serde(default = "default_epinephrine_interval")]
    pub epinephrine_interval_seconds: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            rhythm_check_interval_seconds: default_rhythm_check_interval(),
            epinephrine_interval_seconds: default_epinephrine_interval(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Actor recorded on events logged without one
    #[serde(default = "default_actor")]
    pub default_actor: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_actor: default_actor(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("cprtrack")
}

fn default_rhythm_check_interval() -> u32 {
    120
}

fn default_epinephrine_interval() -> u32 {
    180
}

fn default_actor() -> String {
    crate::machine::DEFAULT_ACTOR.to_string()
}

impl Config {
    /// Load configuration from the standard config path
    ///
    /// Returns defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("cprtrack").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.timers.rhythm_check_interval_seconds == 0 {
            return Err(Error::Config(
                "timers.rhythm_check_interval_seconds must be greater than zero".into(),
            ));
        }
        if self.timers.epinephrine_interval_seconds == 0 {
            return Err(Error::Config(
                "timers.epinephrine_interval_seconds must be greater than zero".into(),
            ));
        }
        if self.session.default_actor.trim().is_empty() {
            return Err(Error::Config("session.default_actor must not be empty".into()));
        }
        Ok(())
    }

    /// Intervals for a newly started code
    pub fn timer_settings(&self) -> TimerSettings {
        TimerSettings {
            rhythm_check_interval_seconds: self.timers.rhythm_check_interval_seconds,
            epinephrine_interval_seconds: self.timers.epinephrine_interval_seconds,
        }
    }

    /// Snapshot and history files live under here
    pub fn data_dir(&self) -> &Path {
        &self.data.data_dir
    }
}
