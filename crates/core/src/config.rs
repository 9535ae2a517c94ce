//! Watcher configuration
//!
//! Loaded from TOML or built in code. Intervals are stored in milliseconds
//! so config files stay readable:
//!
//! ```toml
//! initial_interval_ms = 1000
//! min_interval_ms = 500
//! max_interval_ms = 5000
//! activity_threshold = 5
//! adjustment_window = 1
//! notify = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while building or loading a [`WatchConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("interval bounds must satisfy 0 < min ({min_ms}ms) <= initial ({initial_ms}ms) <= max ({max_ms}ms)")]
    InvalidBounds {
        min_ms: u64,
        initial_ms: u64,
        max_ms: u64,
    },

    #[error("adjustment_window must be at least 1 cycle")]
    ZeroWindow,

    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config")]
    Render(#[from] toml::ser::Error),
}

/// Polling configuration shared by every watched path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Interval each path starts with (default: 1000ms)
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,

    /// Lower bound under heavy activity (default: 500ms)
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Upper bound when idle (default: 5000ms)
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    /// Changes per window above which the interval is halved (default: 5)
    #[serde(default = "default_activity_threshold")]
    pub activity_threshold: u32,

    /// Poll cycles between interval adjustments (default: 1)
    #[serde(default = "default_adjustment_window")]
    pub adjustment_window: u32,

    /// Register native rename/unlink notifications as an early signal (default: true)
    #[serde(default = "default_true")]
    pub notify: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            min_interval_ms: default_min_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            activity_threshold: default_activity_threshold(),
            adjustment_window: default_adjustment_window(),
            notify: true,
        }
    }
}

impl WatchConfig {
    /// Build a config from the three interval bounds, other fields default
    pub fn with_intervals(initial: Duration, min: Duration, max: Duration) -> Self {
        Self {
            initial_interval_ms: duration_ms(initial),
            min_interval_ms: duration_ms(min),
            max_interval_ms: duration_ms(max),
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check `0 < min <= initial <= max` and a non-zero adjustment window
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = self.min_interval_ms > 0
            && self.min_interval_ms <= self.initial_interval_ms
            && self.initial_interval_ms <= self.max_interval_ms;

        if !ordered {
            return Err(ConfigError::InvalidBounds {
                min_ms: self.min_interval_ms,
                initial_ms: self.initial_interval_ms,
                max_ms: self.max_interval_ms,
            });
        }

        if self.adjustment_window == 0 {
            return Err(ConfigError::ZeroWindow);
        }

        Ok(())
    }

    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn default_initial_interval_ms() -> u64 {
    1000
}

fn default_min_interval_ms() -> u64 {
    500
}

fn default_max_interval_ms() -> u64 {
    5000
}

fn default_activity_threshold() -> u32 {
    5
}

fn default_adjustment_window() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = WatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.initial_interval(), Duration::from_millis(1000));
        assert_eq!(config.min_interval(), Duration::from_millis(500));
        assert_eq!(config.max_interval(), Duration::from_millis(5000));
        assert_eq!(config.activity_threshold, 5);
        assert_eq!(config.adjustment_window, 1);
        assert!(config.notify);
    }

    #[test]
    fn test_rejects_misordered_bounds() {
        let config = WatchConfig::with_intervals(
            Duration::from_millis(100),
            Duration::from_millis(500),
            Duration::from_millis(5000),
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBounds { initial_ms: 100, .. })
        ));

        let config = WatchConfig::with_intervals(
            Duration::from_millis(6000),
            Duration::from_millis(500),
            Duration::from_millis(5000),
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_min_and_zero_window() {
        let config = WatchConfig::with_intervals(Duration::ZERO, Duration::ZERO, Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBounds { .. })
        ));

        let config = WatchConfig {
            adjustment_window: 0,
            ..WatchConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroWindow)));
    }

    #[test]
    fn test_equal_bounds_are_allowed() {
        let d = Duration::from_millis(250);
        assert!(WatchConfig::with_intervals(d, d, d).validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = WatchConfig::from_toml_str(
            "initial_interval_ms = 100\nmin_interval_ms = 50\nmax_interval_ms = 200\n",
        )
        .unwrap();

        assert_eq!(config.initial_interval_ms, 100);
        assert_eq!(config.min_interval_ms, 50);
        assert_eq!(config.max_interval_ms, 200);
        assert_eq!(config.activity_threshold, 5);
        assert!(config.notify);
    }

    #[test]
    fn test_toml_validation_fails_fast() {
        let err = WatchConfig::from_toml_str("initial_interval_ms = 10\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBounds { .. }));

        let err = WatchConfig::from_toml_str("initial_interval_ms = \"soon\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_roundtrips_through_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pollwatch.toml");

        let config = WatchConfig {
            activity_threshold: 2,
            adjustment_window: 4,
            notify: false,
            ..WatchConfig::default()
        };
        fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        assert_eq!(WatchConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = WatchConfig::load(&temp_dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
