//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the user service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Health probe settings.
    pub health: HealthConfig,

    /// Demonstration work endpoints (`/single`, `/multi`).
    pub work: WorkConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Shared deadline for every shutdown participant in seconds.
    pub shutdown_secs: u64,

    /// Timeout for a single `/multi` sub-request in seconds.
    pub subrequest_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_secs: 30,
            subrequest_secs: 5,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, for development.
    #[default]
    Pretty,
    /// One JSON object per line, for log aggregation.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Service name attached to every exported span.
    pub service_name: String,

    /// Default log filter, used when `RUST_LOG` is not set.
    pub log_filter: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Prometheus scrape endpoint bind address. Only used in traced mode;
    /// an empty string disables the endpoint.
    pub metrics_address: Option<String>,

    /// Number of finished spans buffered before they are written out.
    pub span_batch_size: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "traced-user-service".to_string(),
            log_filter: "traced_user_service=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_address: Some("0.0.0.0:9090".to_string()),
            span_batch_size: 64,
        }
    }
}

/// Which read-only probe the health endpoint runs.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum HealthProbe {
    /// List at most one user through the domain service.
    #[default]
    StoreList,
    /// Report healthy without touching the store (liveness only).
    None,
}

/// Health endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HealthConfig {
    /// Probe executed by `GET /health`.
    pub probe: HealthProbe,
}

/// Simulated work for the demonstration endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkConfig {
    /// Lower bound of the simulated `/single` latency in milliseconds.
    pub min_sleep_ms: u64,

    /// Upper bound of the simulated `/single` latency in milliseconds.
    pub max_sleep_ms: u64,

    /// Minimum number of `/single` calls issued by `/multi`.
    pub min_fanout: u32,

    /// Maximum number of `/single` calls issued by `/multi`.
    pub max_fanout: u32,

    /// Target for `/multi` sub-requests. Defaults to this server's own `/single`.
    pub single_url: Option<String>,
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self {
            min_sleep_ms: 100,
            max_sleep_ms: 200,
            min_fanout: 3,
            max_fanout: 6,
            single_url: None,
        }
    }
}
