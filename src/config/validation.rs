//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the listen address and route patterns/URLs
//! - Detect duplicate route patterns
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Pattern and URL rules are shared with the route table

use std::collections::HashSet;
use std::net::{SocketAddr, ToSocketAddrs};

use crate::config::schema::GatewayConfig;
use crate::routing::table::{check_pattern, parse_backend_url, RouteError};

/// A single semantic problem found in a configuration.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("server.address {address:?} is invalid: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("server.health_check_path {0:?} must start with /")]
    InvalidHealthCheckPath(String),

    #[error("upstreams: at least one upstream is required")]
    MissingUpstreams,

    #[error("upstreams[{index}].{field} is missing")]
    MissingField { index: usize, field: &'static str },

    #[error("upstreams[{index}]: {source}")]
    InvalidUpstream { index: usize, source: RouteError },

    #[error("upstreams[{index}].pattern {pattern:?} is already used by another upstream")]
    DuplicatePattern { index: usize, pattern: String },

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a configuration whose defaults were already applied.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let address = &config.server.address;
    match address.to_socket_addrs() {
        Ok(mut addrs) => {
            if addrs.next().is_none() {
                errors.push(ValidationError::InvalidAddress {
                    address: address.clone(),
                    reason: "resolves to no addresses".to_string(),
                });
            }
        }
        Err(e) => errors.push(ValidationError::InvalidAddress {
            address: address.clone(),
            reason: e.to_string(),
        }),
    }

    if !config.server.health_check_path.starts_with('/') {
        errors.push(ValidationError::InvalidHealthCheckPath(
            config.server.health_check_path.clone(),
        ));
    }

    if config.upstreams.is_empty() {
        errors.push(ValidationError::MissingUpstreams);
    }

    let mut seen = HashSet::new();
    for (index, upstream) in config.upstreams.iter().enumerate() {
        if upstream.pattern.is_empty() {
            errors.push(ValidationError::MissingField { index, field: "pattern" });
        } else if let Err(source) = check_pattern(&upstream.pattern) {
            errors.push(ValidationError::InvalidUpstream { index, source });
        } else if !seen.insert(upstream.pattern.as_str()) {
            errors.push(ValidationError::DuplicatePattern {
                index,
                pattern: upstream.pattern.clone(),
            });
        }

        if upstream.url.is_empty() {
            errors.push(ValidationError::MissingField { index, field: "url" });
        } else if let Err(source) = parse_backend_url(&upstream.url) {
            errors.push(ValidationError::InvalidUpstream { index, source });
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
