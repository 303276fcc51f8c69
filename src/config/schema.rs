//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener and connection tuning.
    pub server: ServerConfig,

    /// Upstream routes, one forwarding handler each.
    pub upstreams: Vec<UpstreamConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Server tuning handed to the gateway server at construction.
///
/// Zero values are treated as "unset" and replaced by [`ServerConfig::with_defaults`].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:8080" or ":8080").
    pub address: String,

    /// Time allowed for a client to send the request headers.
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,

    /// Time allowed to produce a response once the request was read.
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,

    /// How long a keep-alive connection may sit idle before it is closed.
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,

    /// Upper bound on the size of request headers.
    pub max_header_bytes: usize,

    /// How long shutdown waits for in-flight requests before forcing connections closed.
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,

    /// Path answered by the liveness handler.
    pub health_check_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8080".to_string(),
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(120),
            max_header_bytes: 1024 * 1024,
            shutdown_timeout: Duration::from_secs(10),
            health_check_path: "/health-check".to_string(),
        }
    }
}

impl ServerConfig {
    /// Replace empty and zero fields with their defaults.
    ///
    /// A Go-style `:port` address is expanded to listen on all interfaces.
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.address.trim().is_empty() {
            self.address = defaults.address;
        } else if self.address.starts_with(':') {
            self.address = format!("0.0.0.0{}", self.address);
        }
        if self.read_timeout.is_zero() {
            self.read_timeout = defaults.read_timeout;
        }
        if self.write_timeout.is_zero() {
            self.write_timeout = defaults.write_timeout;
        }
        if self.idle_timeout.is_zero() {
            self.idle_timeout = defaults.idle_timeout;
        }
        if self.max_header_bytes == 0 {
            self.max_header_bytes = defaults.max_header_bytes;
        }
        if self.shutdown_timeout.is_zero() {
            self.shutdown_timeout = defaults.shutdown_timeout;
        }
        if self.health_check_path.is_empty() {
            self.health_check_path = defaults.health_check_path;
        }
        self
    }
}

/// One upstream route: requests under `pattern` go to `url`.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct UpstreamConfig {
    /// Path pattern, rooted and terminated by `/` (e.g., "/api/").
    #[serde(default)]
    pub pattern: String,

    /// Remove the pattern (minus its trailing slash) from the forwarded path.
    #[serde(default, alias = "rewrite_prefix")]
    pub strip_prefix: bool,

    /// Backend base URL (e.g., "http://127.0.0.1:9001").
    #[serde(default)]
    pub url: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
