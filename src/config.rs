// src/config.rs
//!
//! Runtime configuration for the monitoring backend
//!
//! All intervals and tuning knobs are externalized so deployments can adjust
//! them without a rebuild. Values not present in the config file fall back
//! to the defaults below.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OtwatchError, Result};

/// Top-level configuration for the monitoring backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to (default: 127.0.0.1:8081)
    pub listen_addr: String,
    /// Subscriber hub settings
    pub sse: SseConfig,
    /// Periodic driver settings
    pub scheduler: SchedulerConfig,
    /// Correlation engine settings
    pub correlation: CorrelationConfig,
    /// First threat index handed out when the store is empty (default: 1000)
    pub index_start: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8081".to_string(),
            sse: SseConfig::default(),
            scheduler: SchedulerConfig::default(),
            correlation: CorrelationConfig::default(),
            index_start: 1000,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file, falling back to defaults for
    /// missing fields
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OtwatchError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| OtwatchError::ConfigError(format!("invalid config file: {}", e)))
    }
}

/// Subscriber hub (SSE) settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SseConfig {
    /// Per-connection timeout in seconds; the stream is closed afterwards
    /// and the client is expected to resubscribe (default: 3600)
    pub timeout_secs: u64,
    /// Heartbeat interval in seconds (default: 30)
    pub heartbeat_secs: u64,
    /// Bounded per-subscriber channel capacity; a subscriber whose channel
    /// is full at delivery time is dropped (default: 32)
    pub channel_capacity: usize,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 3600,
            heartbeat_secs: 30,
            channel_capacity: 32,
        }
    }
}

impl SseConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

/// Periodic driver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// New-threat poll interval in milliseconds (default: 5000)
    pub refresh_interval_ms: u64,
    /// Statistics push interval in milliseconds (default: 1000)
    pub stats_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 5000,
            stats_interval_ms: 1000,
        }
    }
}

impl SchedulerConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms)
    }
}

/// Correlation engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Symmetric tolerance around the analysis timestamp used when exact
    /// matching fails, in seconds (default: 5)
    pub window_secs: i64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self { window_secs: 5 }
    }
}
