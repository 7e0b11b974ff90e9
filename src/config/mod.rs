//! Configuration for the SENT host tools.
//!
//! The decoder itself is configuration-free: the protocol timing is fixed
//! and the unit tick is calibrated from the wire. What the host configures
//! is the capture environment (the timer clock, for diagnostics expressed
//! in microseconds) and replay reporting.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub replay: ReplayConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml(&content)?)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Capture-source description
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Timer clock driving the tick counts, in Hz. Used only for the
    /// microsecond diagnostics in reports.
    pub core_clock_hz: u32,
}

impl CaptureConfig {
    /// Convert a tick count to microseconds using the configured clock.
    pub fn ticks_to_us(&self, ticks: f64) -> f64 {
        ticks * 1_000_000.0 / f64::from(self.core_clock_hz)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            core_clock_hz: default_core_clock_hz(),
        }
    }
}

fn default_core_clock_hz() -> u32 {
    168_000_000
}

/// Replay reporting knobs
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Log one decoded frame out of every `report_every` (0 = summary only).
    pub report_every: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            report_every: default_report_every(),
        }
    }
}

fn default_report_every() -> u64 {
    0
}
