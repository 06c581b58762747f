//! Driver configuration.
//!
//! Every field has a default, so a JSON file only needs to name the values
//! it changes:
//!
//! ```json
//! { "http_port": 8080, "queue_capacity": 20 }
//! ```

use crate::error::{R2000Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DriverConfig {
    /// Port of the HTTP command interface.
    #[serde(default = "defaults::http_port")]
    pub http_port: u16,

    /// Timeout of a single HTTP command.
    #[serde(default = "defaults::http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Start angle of the scan output in 1/10000 degree.
    #[serde(default = "defaults::start_angle")]
    pub start_angle: i32,

    /// Local UDP port for scan data, 0 picks an ephemeral port.
    #[serde(default)]
    pub udp_bind_port: u16,

    /// Address the scanner sends UDP data to. Empty means discover it.
    #[serde(default)]
    pub udp_address: String,

    /// Maximum number of scans held before the oldest are dropped.
    #[serde(default = "defaults::queue_capacity")]
    pub queue_capacity: usize,

    /// Size of a single socket read.
    #[serde(default = "defaults::receive_buffer_size")]
    pub receive_buffer_size: usize,

    /// Receiver is considered dead after this long without data.
    #[serde(default = "defaults::silence_timeout_ms")]
    pub silence_timeout_ms: u64,

    /// Socket read timeout. Bounds how long a shutdown request can go unseen.
    #[serde(default = "defaults::read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            http_port: defaults::http_port(),
            http_timeout_ms: defaults::http_timeout_ms(),
            start_angle: defaults::start_angle(),
            udp_bind_port: 0,
            udp_address: String::new(),
            queue_capacity: defaults::queue_capacity(),
            receive_buffer_size: defaults::receive_buffer_size(),
            silence_timeout_ms: defaults::silence_timeout_ms(),
            read_timeout_ms: defaults::read_timeout_ms(),
        }
    }
}

impl DriverConfig {
    pub fn from_json_str(json: &str) -> Result<DriverConfig> {
        let config: DriverConfig =
            serde_json::from_str(json).map_err(|e| R2000Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<DriverConfig> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| R2000Error::Config(format!("{}: {}", path.display(), e)))?;
        DriverConfig::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(R2000Error::Config("queue_capacity must be positive".into()));
        }
        if self.receive_buffer_size == 0 {
            return Err(R2000Error::Config(
                "receive_buffer_size must be positive".into(),
            ));
        }
        if self.read_timeout_ms == 0 {
            return Err(R2000Error::Config("read_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn silence_timeout(&self) -> Duration {
        Duration::from_millis(self.silence_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

mod defaults {
    pub fn http_port() -> u16 {
        80
    }

    pub fn http_timeout_ms() -> u64 {
        20_000
    }

    pub fn start_angle() -> i32 {
        -1_800_000
    }

    pub fn queue_capacity() -> usize {
        100
    }

    pub fn receive_buffer_size() -> usize {
        65536
    }

    pub fn silence_timeout_ms() -> u64 {
        2000
    }

    pub fn read_timeout_ms() -> u64 {
        100
    }
}
