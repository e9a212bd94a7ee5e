//! Configuration system

use crate::ecs::RunMode;
pub use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from a `.toml` or `.ron` file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match Format::of(path)? {
            Format::Toml => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Format::Ron => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Save configuration to a `.toml` or `.ron` file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match Format::of(path)? {
            Format::Toml => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?,
            Format::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

enum Format {
    Toml,
    Ron,
}

impl Format {
    fn of(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is out of range
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Game loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fixed simulation step in milliseconds
    pub time_step_ms: f64,
    /// Upper bound on the elapsed time taken from one frame
    pub max_frame_time_ms: f64,
    /// Elapsed times above `stall_factor * time_step_ms` count as a single step
    pub stall_factor: f64,
    /// Frame rate targeted by the blocking driver
    pub target_fps: u32,
    /// Dispatch strategy for update passes
    pub update_mode: RunMode,
    /// Dispatch strategy for render passes
    pub render_mode: RunMode,
    /// Log filter handed to the logger by hosts
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_step_ms: 1000.0 / 60.0,
            max_frame_time_ms: 1000.0,
            stall_factor: 10.0,
            target_fps: 60,
            update_mode: RunMode::Default,
            render_mode: RunMode::Default,
            log_level: "info".to_string(),
        }
    }
}

impl Config for EngineConfig {}

impl EngineConfig {
    /// Builder-style time step override
    pub fn with_time_step(mut self, time_step_ms: f64) -> Self {
        self.time_step_ms = time_step_ms;
        self
    }

    /// Builder-style dispatch mode override for both phases
    pub fn with_modes(mut self, update_mode: RunMode, render_mode: RunMode) -> Self {
        self.update_mode = update_mode;
        self.render_mode = render_mode;
        self
    }

    /// Interval between frames of the blocking driver, in milliseconds
    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / f64::from(self.target_fps.max(1))
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.time_step_ms.is_finite() && self.time_step_ms > 0.0) {
            return Err(ConfigError::Invalid {
                field: "time_step_ms",
                reason: format!("must be a positive number, got {}", self.time_step_ms),
            });
        }
        if !(self.max_frame_time_ms.is_finite() && self.max_frame_time_ms >= self.time_step_ms) {
            return Err(ConfigError::Invalid {
                field: "max_frame_time_ms",
                reason: format!("must be at least time_step_ms, got {}", self.max_frame_time_ms),
            });
        }
        if !(self.stall_factor.is_finite() && self.stall_factor >= 1.0) {
            return Err(ConfigError::Invalid {
                field: "stall_factor",
                reason: format!("must be at least 1, got {}", self.stall_factor),
            });
        }
        if self.target_fps == 0 {
            return Err(ConfigError::Invalid {
                field: "target_fps",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
