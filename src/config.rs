//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the live-tracker.toml file.
//! It provides a centralized way to configure the tracked location, the wake window,
//! ticker cadences, and where preferences and the sun-event table live on disk.

use chrono::NaiveDateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "live-tracker.toml";

/// Application configuration loaded from live-tracker.toml
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Tracked location and map camera
    pub location: LocationConfig,
    /// Wake window, birth date and chime cadence
    pub schedule: ScheduleConfig,
    /// Ticker cadences
    pub ticker: TickerConfig,
    /// On-disk locations of preferences and the sun table
    pub paths: PathsConfig,
}

/// Tracked location configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocationConfig {
    /// Human-readable place name shown in the header
    pub name: String,
    /// IANA timezone used for every "local" computation
    pub timezone: String,
    pub longitude: f64,
    pub latitude: f64,
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
    /// Environment variable holding the map access token
    pub access_token_env: String,
}

/// Daily schedule configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    /// First hour (inclusive) of the wake window
    pub wake_start_hour: u32,
    /// Last hour (exclusive) of the wake window
    pub wake_end_hour: u32,
    /// Birth instant in local time, `YYYY-MM-DDTHH:MM:SS`
    pub birth: String,
    /// Chime every N minutes within the wake window
    pub ping_interval_minutes: u32,
    /// Chime state when no preference has been stored yet
    pub ping_default_on: bool,
}

/// Ticker cadence configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TickerConfig {
    pub clock_interval_ms: u64,
    pub fast_interval_ms: u64,
    /// Fast ticker interval on battery power below the threshold
    pub throttled_interval_ms: u64,
    /// Charge fraction (0-1) at or below which the fast ticker throttles
    pub battery_threshold: f32,
    /// Frame cadence of the scheduling loop
    pub frame_ms: u64,
}

/// File locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    pub prefs: PathBuf,
    pub sun_events: PathBuf,
}

/// Validated wake window hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for WakeWindow {
    fn default() -> Self {
        WakeWindow {
            start_hour: 7,
            end_hour: 22,
        }
    }
}

impl WakeWindow {
    /// Window length in hours.
    pub fn hours(&self) -> u32 {
        self.end_hour - self.start_hour
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            location: LocationConfig {
                name: "Bassett St, Denver".to_string(),
                timezone: "America/Denver".to_string(),
                longitude: -105.003_313_890_979_54,
                latitude: 39.756_460_650_305_63,
                zoom: 16.5,
                pitch: 0.0,
                bearing: 0.0,
                access_token_env: "MAPBOX_TOKEN".to_string(),
            },
            schedule: ScheduleConfig {
                wake_start_hour: 7,
                wake_end_hour: 22,
                birth: "1993-09-08T00:00:00".to_string(),
                ping_interval_minutes: 15,
                ping_default_on: true,
            },
            ticker: TickerConfig {
                clock_interval_ms: 1000,
                fast_interval_ms: 100,
                throttled_interval_ms: 400,
                battery_threshold: 0.5,
                frame_ms: 16, // ~60 fps, like an animation frame
            },
            paths: PathsConfig {
                prefs: PathBuf::from("live-tracker-prefs.json"),
                sun_events: PathBuf::from("sun-events.json"),
            },
        }
    }
}

impl Config {
    /// Load configuration from live-tracker.toml file
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!("Loaded configuration for location: {}", config.location.name);
                    config
                }
                Err(e) => {
                    warn!("Invalid config file format: {}", e);
                    warn!("Using default configuration (Denver, CO)");
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found, using default configuration (Denver, CO)");
                Self::default()
            }
        }
    }

    /// Save current configuration to the given path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        info!("Configuration saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Resolve the configured timezone, falling back to UTC when unknown.
    pub fn timezone(&self) -> Tz {
        self.location.timezone.parse::<Tz>().unwrap_or_else(|e| {
            warn!("Unknown timezone {:?} ({}), using UTC", self.location.timezone, e);
            Tz::UTC
        })
    }

    /// The wake window, or the default one when the configured hours are unusable.
    pub fn wake_window(&self) -> WakeWindow {
        let start = self.schedule.wake_start_hour;
        let end = self.schedule.wake_end_hour;
        if start < end && end <= 24 {
            WakeWindow {
                start_hour: start,
                end_hour: end,
            }
        } else {
            warn!("Invalid wake window {}..{}, using 7..22", start, end);
            WakeWindow::default()
        }
    }

    /// Parse the configured birth instant as a naive local date-time.
    pub fn birth(&self) -> Option<NaiveDateTime> {
        match NaiveDateTime::parse_from_str(&self.schedule.birth, "%Y-%m-%dT%H:%M:%S") {
            Ok(birth) => Some(birth),
            Err(e) => {
                warn!("Invalid birth date {:?}: {}", self.schedule.birth, e);
                None
            }
        }
    }

    pub fn clock_interval(&self) -> Duration {
        Duration::from_millis(self.ticker.clock_interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.ticker.frame_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.location.timezone, "America/Denver");
        assert_eq!(config.schedule.wake_start_hour, 7);
        assert_eq!(config.schedule.wake_end_hour, 22);
        assert_eq!(config.schedule.ping_interval_minutes, 15);
        assert_eq!(config.ticker.fast_interval_ms, 100);
        assert_eq!(config.ticker.throttled_interval_ms, 400);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.location.name, parsed.location.name);
        assert_eq!(config.paths.prefs, parsed.paths.prefs);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fallback to default
        assert_eq!(config.location.timezone, "America/Denver");
    }

    #[test]
    fn test_load_invalid_file_falls_back() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), "this is [not toml").unwrap();
        let config = Config::load_from_path(file.path());
        assert_eq!(config.schedule.birth, "1993-09-08T00:00:00");
    }

    #[test]
    fn test_save_then_load() {
        let file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.location.name = "Somewhere".to_string();
        config.save(file.path()).unwrap();
        let loaded = Config::load_from_path(file.path());
        assert_eq!(loaded.location.name, "Somewhere");
    }

    #[test]
    fn test_timezone_fallback() {
        let mut config = Config::default();
        assert_eq!(config.timezone(), chrono_tz::America::Denver);
        config.location.timezone = "Mars/Olympus_Mons".to_string();
        assert_eq!(config.timezone(), Tz::UTC);
    }

    #[test]
    fn test_invalid_wake_window_uses_default() {
        let mut config = Config::default();
        config.schedule.wake_start_hour = 23;
        config.schedule.wake_end_hour = 6;
        assert_eq!(config.wake_window(), WakeWindow::default());
        assert_eq!(config.wake_window().hours(), 15);
    }

    #[test]
    fn test_birth_parses() {
        let config = Config::default();
        let birth = config.birth().unwrap();
        assert_eq!(birth.to_string(), "1993-09-08 00:00:00");
    }
}
