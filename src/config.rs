//! Configuration management.
//!
//! Settings are loaded from a TOML file via the `config` crate, with every
//! field defaulted so a missing file or a sparse one still yields a runnable
//! configuration. Semantic checks that parsing cannot express (ports, sizes,
//! marker non-empty) live in [`Settings::validate`].

use crate::error::{AppResult, GazeError};
use crate::frame::FrameSpec;
use config::Config;
use serde::Deserialize;
use std::time::Duration;

/// Default initialization command sequence for the tracker.
///
/// Written verbatim, in order, immediately after connecting; the device sends
/// no acknowledgement. Enables cursor, fixation point-of-gaze, timestamp and
/// data streaming.
pub fn default_init_commands() -> Vec<String> {
    [
        "ENABLE_SEND_CURSOR",
        "ENABLE_SEND_POG_FIX",
        "ENABLE_SEND_TIME",
        "ENABLE_SEND_DATA",
    ]
    .iter()
    .map(|id| format!("<SET ID=\"{}\" STATE=\"1\" />\r\n", id))
    .collect()
}

/// Upstream tracker connection settings. Immutable after startup.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackerSettings {
    /// Tracker host.
    pub host: String,
    /// Tracker control/data port.
    pub port: u16,
    /// Maximum bytes per socket read.
    pub buffer_size: usize,
    /// Delay between reconnect attempts after the upstream drops.
    #[serde(with = "humantime_serde")]
    pub reconnect_delay: Duration,
    /// Commands written verbatim after connecting, in order.
    pub init_commands: Vec<String>,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4242,
            buffer_size: 4096,
            reconnect_delay: Duration::from_secs(5),
            init_commands: default_init_commands(),
        }
    }
}

impl TrackerSettings {
    /// `host:port` for connecting.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Relay listener settings. Immutable after startup.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelaySettings {
    /// Interface to listen on.
    pub host: String,
    /// Port to listen on. Use 0 to let the OS pick (tests).
    pub port: u16,
    /// Listen backlog hint. Acceptance itself is unbounded.
    pub max_clients: u32,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 6970,
            max_clients: 5,
        }
    }
}

impl RelaySettings {
    /// `host:port` for binding.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Screen dimensions used by consumers mapping gaze to pixels.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScreenSettings {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for ScreenSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Top-level application settings.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Log filter, e.g. `info` or `gaze_relay=debug`.
    pub log_level: Option<String>,
    /// Upstream tracker connection.
    pub tracker: TrackerSettings,
    /// Fan-out relay listener.
    pub relay: RelaySettings,
    /// Record framing layout.
    pub frame: FrameSpec,
    /// Screen mapping for pixel conversion.
    pub screen: ScreenSettings,
}

impl Settings {
    /// Load settings from `config/<name>.toml` (defaulting to
    /// `config/default`), falling back to built-in defaults for anything the
    /// file omits. A missing file is not an error.
    pub fn new(config_name: Option<&str>) -> AppResult<Self> {
        let config_path = format!("config/{}", config_name.unwrap_or("default"));
        Self::from_path(&config_path)
    }

    /// Load settings from an explicit path (extension optional).
    pub fn from_path(path: &str) -> AppResult<Self> {
        let s = Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()
            .map_err(GazeError::Config)?;

        let settings: Settings = s.try_deserialize().map_err(GazeError::Config)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Semantic validation beyond what deserialization enforces.
    pub fn validate(&self) -> AppResult<()> {
        if self.tracker.host.is_empty() {
            return Err(GazeError::Configuration(
                "tracker.host must not be empty".to_string(),
            ));
        }
        if self.tracker.port == 0 {
            return Err(GazeError::Configuration(
                "tracker.port must be non-zero".to_string(),
            ));
        }
        if self.tracker.buffer_size == 0 {
            return Err(GazeError::Configuration(
                "tracker.buffer_size must be positive".to_string(),
            ));
        }
        if self.frame.start_marker.is_empty() {
            return Err(GazeError::Configuration(
                "frame.start_marker must not be empty".to_string(),
            ));
        }
        if self.frame.record_len < self.frame.start_marker.len() {
            return Err(GazeError::Configuration(format!(
                "frame.record_len ({}) must be at least the marker length ({})",
                self.frame.record_len,
                self.frame.start_marker.len()
            )));
        }
        if self.screen.width == 0 || self.screen.height == 0 {
            return Err(GazeError::Configuration(format!(
                "screen dimensions must be positive, got {}x{}",
                self.screen.width, self.screen.height
            )));
        }
        Ok(())
    }
}
