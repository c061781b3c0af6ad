//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the profiler.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::lifecycle::signals::TriggerSignal;

/// Root configuration for the signal-armed debug endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Signal that arms the debug endpoint.
    pub signal: TriggerSignal,

    /// Listen address of the debug endpoint (e.g., ":6666", "127.0.0.1:6060").
    pub address: String,

    /// How long the endpoint serves after a signal, in seconds.
    /// Also the deadline for draining in-flight requests on shutdown.
    pub timeout_secs: u64,

    /// Per-request timeout on the debug routes, in seconds.
    pub request_timeout_secs: u64,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            signal: TriggerSignal::default(),
            address: ":6666".to_string(),
            timeout_secs: 10 * 60,
            request_timeout_secs: 60,
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ProfilerConfig {
    /// Serving duration and shutdown-drain deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics exporter.
    pub metrics_enabled: bool,

    /// Metrics exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
