//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse, bounds ordered)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field}: lower bound {min} exceeds upper bound {max}")]
    InvertedRange { field: &'static str, min: u64, max: u64 },

    #[error("{field}: '{value}' is not an http url")]
    InvalidUrl { field: &'static str, value: String },
}

/// Check an [`AppConfig`] for semantic errors.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::Zero { field: "listener.max_body_bytes" });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    }
    if config.timeouts.shutdown_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.shutdown_secs" });
    }
    if config.timeouts.subrequest_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.subrequest_secs" });
    }

    if let Some(addr) = config.observability.metrics_address.as_deref().filter(|a| !a.is_empty()) {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                field: "observability.metrics_address",
                value: addr.to_string(),
            });
        }
    }
    if config.observability.span_batch_size == 0 {
        errors.push(ValidationError::Zero { field: "observability.span_batch_size" });
    }

    let work = &config.work;
    if work.min_sleep_ms > work.max_sleep_ms {
        errors.push(ValidationError::InvertedRange {
            field: "work.sleep_ms",
            min: work.min_sleep_ms,
            max: work.max_sleep_ms,
        });
    }
    if work.min_fanout == 0 {
        errors.push(ValidationError::Zero { field: "work.min_fanout" });
    }
    if work.min_fanout > work.max_fanout {
        errors.push(ValidationError::InvertedRange {
            field: "work.fanout",
            min: work.min_fanout as u64,
            max: work.max_fanout as u64,
        });
    }
    if let Some(url) = &work.single_url {
        if !url.starts_with("http://") {
            errors.push(ValidationError::InvalidUrl {
                field: "work.single_url",
                value: url.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
