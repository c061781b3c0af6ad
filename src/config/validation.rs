//! Configuration validation.
//!
//! Serde handles the syntax; this module checks value ranges and addresses.
//! Validation returns all errors, not just the first.

use thiserror::Error;

use crate::config::schema::ProfilerConfig;
use crate::net::listener::normalize_address;

/// A single semantic problem found in a [`ProfilerConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("address must not be empty")]
    EmptyAddress,

    #[error("address {0:?} is not of the form host:port or :port")]
    InvalidAddress(String),

    #[error("timeout_secs must be greater than zero")]
    ZeroTimeout,

    #[error("request_timeout_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("signal {0} cannot be caught")]
    UncatchableSignal(String),

    #[error("metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ProfilerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.address.trim().is_empty() {
        errors.push(ValidationError::EmptyAddress);
    } else if normalize_address(&config.address).is_none() {
        errors.push(ValidationError::InvalidAddress(config.address.clone()));
    }

    if config.timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if config.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if !config.signal.is_catchable() {
        errors.push(ValidationError::UncatchableSignal(config.signal.to_string()));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
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
