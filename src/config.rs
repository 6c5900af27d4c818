use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

/// Top-level configuration: the serial device plus stream-splitter knobs.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Path to the serial device (e.g. "/dev/gps-uart1")
    pub device: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    #[serde(default)]
    pub stream: StreamConfig,
}

/// Knobs for the demux/mux pair and its queues.
#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    /// Queue TTL: data older than this is discarded unread
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
    /// How long a single queue read blocks before returning empty
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Upper bound for `read_line` and unterminated NMEA sentences
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
    /// Capacity of the framing-anomaly channel
    #[serde(default = "default_anomaly_capacity")]
    pub anomaly_capacity: usize,
}

fn default_baud() -> u32 { 38400 }
fn default_ttl_ms() -> u64 { 1000 }
fn default_read_timeout_ms() -> u64 { 1000 }
fn default_max_line_len() -> usize { 1024 }
fn default_anomaly_capacity() -> usize { 64 }

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            max_line_len: default_max_line_len(),
            anomaly_capacity: default_anomaly_capacity(),
        }
    }
}

impl StreamConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .await
            .context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.device.is_empty() {
            anyhow::bail!("device path is empty");
        }

        #[cfg(unix)]
        if !std::path::Path::new(&self.device).exists() {
            tracing::warn!("Serial device {} does not exist", self.device);
        }

        if self.baud == 0 {
            anyhow::bail!("baud rate must be non-zero");
        }

        if self.stream.ttl_ms == 0 {
            anyhow::bail!("stream.ttl_ms must be non-zero");
        }

        if self.stream.max_line_len < 16 {
            anyhow::bail!(
                "stream.max_line_len too small: {}",
                self.stream.max_line_len
            );
        }

        if self.stream.anomaly_capacity == 0 {
            anyhow::bail!("stream.anomaly_capacity must be non-zero");
        }

        Ok(())
    }
}
